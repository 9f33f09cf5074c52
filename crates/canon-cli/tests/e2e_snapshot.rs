//! E2E tests for the projection commands: snapshot, compare, sort-timeline.
//!
//! Each test runs the `canon` binary against a timeline in a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn canon_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("canon"));
    cmd.current_dir(dir);
    cmd.env("CANON_LOG", "error");
    cmd.env("FORMAT", "text");
    cmd
}

fn cite(scene: &str, start: u64, end: u64) -> Value {
    json!({"type": "scene", "scene_id": scene, "line_start": start, "line_end": end})
}

fn repo_with_timeline(events: &Value) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("records/characters/jake/timeline.json");
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, serde_json::to_string_pretty(events).expect("json")).expect("write");
    dir
}

fn stdout_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("canon should not crash");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn meditation_timeline() -> Value {
    json!([
        {
            "event_id": "ev.jake.01.03.01.evolve",
            "scene_id": "01.03.01",
            "order": 1,
            "type": "skill_evolved",
            "node_id": "sn.meditation.rank2",
            "tags": ["progression"],
            "source_ref": [cite("01.03.01", 7, 9)]
        },
        {
            "event_id": "ev.jake.01.02.01.acquire",
            "scene_id": "01-02-01",
            "order": 1,
            "type": "skill_acquired",
            "node_id": "sn.meditation.rank1",
            "knowledge_delta": [{"field_path": "mana_regen", "new_value": "1%/min"}],
            "source_ref": [cite("01.02.01", 10, 12)]
        }
    ])
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

#[test]
fn snapshot_prints_projection_state() {
    let dir = repo_with_timeline(&meditation_timeline());
    let state = stdout_json(canon_cmd(dir.path()).args([
        "snapshot",
        "--character",
        "ch.jake",
        "--scene",
        "01.02.01",
    ]));
    assert_eq!(
        state,
        json!({
            "character": "ch.jake",
            "scene": "01.02.01",
            "skills": {
                "sn.meditation.rank1": {
                    "known": true,
                    "facts": {"mana_regen": "1%/min"},
                    "evidence": [cite("01.02.01", 10, 12)]
                }
            },
            "flags": []
        })
    );
}

#[test]
fn snapshot_accepts_root_and_legacy_cutoff() {
    let dir = repo_with_timeline(&meditation_timeline());
    let root = dir.path().to_str().expect("utf8 path").to_string();
    let elsewhere = tempfile::tempdir().expect("tempdir");
    let state = stdout_json(canon_cmd(elsewhere.path()).args([
        "--root",
        root.as_str(),
        "snapshot",
        "--character",
        "jake",
        "--scene",
        "01-03-01",
        "--view",
        "reader",
    ]));
    assert_eq!(state["scene"], "01.03.01");
    assert_eq!(state["flags"], json!(["progression"]));
    assert!(state["skills"].get("sn.meditation.rank2").is_some());
}

#[test]
fn snapshot_is_byte_stable() {
    let dir = repo_with_timeline(&meditation_timeline());
    let run = || {
        canon_cmd(dir.path())
            .args(["snapshot", "--character", "jake", "--scene", "09.09.09"])
            .output()
            .expect("run")
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn snapshot_rejects_bad_cutoff() {
    let dir = repo_with_timeline(&meditation_timeline());
    canon_cmd(dir.path())
        .args(["snapshot", "--character", "jake", "--scene", "1.2.3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("scene id must be BB.CC.SS"));
}

#[test]
fn snapshot_rejects_malformed_timeline() {
    let dir = repo_with_timeline(&json!([{
        "event_id": "ev.jake.01.01.01.x",
        "scene_id": "01.01.01",
        "order": 0,
        "type": "skill_acquired",
        "node_id": "sn.a",
        "source_ref": [cite("01.01.01", 1, 2)]
    }]));
    canon_cmd(dir.path())
        .args(["snapshot", "--character", "jake", "--scene", "01.01.01"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

// ---------------------------------------------------------------------------
// compare
// ---------------------------------------------------------------------------

#[test]
fn compare_reports_confirmation_after_upgrade() {
    let dir = repo_with_timeline(&meditation_timeline());
    let verdict = stdout_json(canon_cmd(dir.path()).args([
        "compare",
        "--character",
        "jake",
        "--topic",
        "sn.meditation",
    ]));
    assert_eq!(verdict["verdict"], "confirmed_before");
    assert_eq!(verdict["upgrade"]["event_id"], "ev.jake.01.03.01.evolve");
    assert_eq!(
        verdict["first_confirmation"]["event_id"],
        "ev.jake.01.02.01.acquire"
    );
}

#[test]
fn compare_with_unmatched_suffix_finds_no_evidence() {
    let dir = repo_with_timeline(&meditation_timeline());
    let verdict = stdout_json(canon_cmd(dir.path()).args([
        "compare",
        "--character",
        "jake",
        "--topic",
        "sn.meditation",
        "--field-suffix",
        "cooldown",
    ]));
    assert_eq!(verdict["verdict"], "no_evidence");
}

// ---------------------------------------------------------------------------
// sort-timeline
// ---------------------------------------------------------------------------

#[test]
fn sort_timeline_rewrites_once() {
    let dir = repo_with_timeline(&meditation_timeline());
    canon_cmd(dir.path())
        .args(["sort-timeline", "--character", "jake"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("sorted "));

    let text = fs::read_to_string(dir.path().join("records/characters/jake/timeline.json"))
        .expect("read");
    let doc: Value = serde_json::from_str(&text).expect("json");
    assert_eq!(doc[0]["event_id"], "ev.jake.01.02.01.acquire");

    canon_cmd(dir.path())
        .args(["--json", "sort-timeline", "--character", "jake"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"changed\": false"));
}
