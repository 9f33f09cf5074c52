//! Integration tests: the full cross-file validation pass over a fixture
//! dataset.

use canon_core::config::Layout;
use canon_core::report::{Check, Report};
use canon_core::verify::{AliasPolicy, TagMode, VerifyOptions, validate_all};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn write(root: &Path, rel: &str, v: &Value) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, serde_json::to_string_pretty(v).expect("json")).expect("write");
}

/// A small dataset that passes every check.
fn clean_dataset() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();

    write(
        root,
        "schemas/scene_index.schema.json",
        &json!({
            "type": "object",
            "required": ["scene_id", "start_line", "end_line"],
            "properties": {"scene_id": {"$ref": "shared/scene_id.schema.json"}}
        }),
    );
    write(
        root,
        "schemas/shared/scene_id.schema.json",
        &json!({"type": "string", "pattern": "^\\d{2}[.-]\\d{2}[.-]\\d{2}$"}),
    );
    write(root, "schemas/character_timeline.schema.json", &json!({"type": "array"}));
    write(root, "schemas/skills.schema.json", &json!({"type": "object"}));
    write(root, "schemas/tag_registry.schema.json", &json!({"type": "object"}));

    write(
        root,
        "records/scene_index/01/01.01.01.json",
        &json!({"scene_id": "01.01.01", "start_line": 1, "end_line": 100}),
    );
    write(
        root,
        "records/skills.json",
        &json!({"Meditation (Common)": {"rarity": "Common"}}),
    );
    write(
        root,
        "tagging/tag_registry.json",
        &json!({
            "skill_type": [
                {"tag": "stealth", "status": "approved", "aliases": ["sneak"]},
                {"tag": "meditation", "status": "approved", "allow_inferred": true}
            ]
        }),
    );
    write(
        root,
        "records/characters/jake/timeline.json",
        &json!([{
            "event_id": "ev.jake.01.01.01.meditate",
            "scene_id": "01.01.01",
            "order": 1,
            "type": "skill_acquired",
            "node_id": "sn.meditation",
            "skills": ["Meditation"],
            "tags": ["meditation"],
            "source_ref": [{
                "type": "scene",
                "scene_id": "01-01-01",
                "line_start": 10,
                "line_end": 20,
                "quote": "He breathed."
            }]
        }]),
    );
    dir
}

fn run(root: &Path, options: &VerifyOptions) -> Report {
    validate_all(&Layout::new(root), options)
}

fn messages(report: &Report) -> Vec<String> {
    report.violations.iter().map(ToString::to_string).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn clean_dataset_passes_strict() {
    let dir = clean_dataset();
    let report = run(dir.path(), &VerifyOptions::default());
    assert!(report.is_ok(true), "{:#?}", messages(&report));
}

#[test]
fn range_containment_reports_exactly_one_violation() {
    let dir = clean_dataset();
    write(
        dir.path(),
        "records/scene_index/01/01.01.01.json",
        &json!({"scene_id": "01.01.01", "start_line": 1, "end_line": 15}),
    );
    let report = run(dir.path(), &VerifyOptions::default());
    let outside: Vec<String> = messages(&report)
        .into_iter()
        .filter(|m| m.contains("fall outside"))
        .collect();
    assert_eq!(outside.len(), 1, "{outside:#?}");
    assert!(outside[0].contains("scene 01.01.01"));
    assert!(outside[0].starts_with("records/characters/jake/timeline.json: /0/source_ref/0"));
    assert!(!report.is_ok(false));
}

#[test]
fn alias_usage_follows_policy() {
    let dir = clean_dataset();
    write(dir.path(), "records/gear/cloaks.json", &json!({"Cloak": {"tags": ["sneak"]}}));

    let warned = run(dir.path(), &VerifyOptions::default());
    assert!(warned.is_ok(false));
    let alias: Vec<String> = warned
        .for_check(Check::Tags)
        .map(ToString::to_string)
        .collect();
    assert_eq!(alias.len(), 1);
    assert!(alias[0].contains("replace with canonical tag 'stealth'"));

    let accept = VerifyOptions {
        alias_policy: AliasPolicy::Accept,
        ..VerifyOptions::default()
    };
    assert!(run(dir.path(), &accept).is_ok(true));
}

#[test]
fn every_check_reports_in_one_pass() {
    let dir = clean_dataset();
    let root = dir.path();
    write(
        root,
        "records/characters/carl/timeline.json",
        &json!([{
            "event_id": "ev.jake.01.01.01.meditate",
            "scene_id": "01.01.01",
            "order": 1,
            "skills": ["Lockpicking"],
            "tags": ["pickpocket", {"tag": "stealth", "inferred": true}],
            "source_ref": [{"scene_id": "07.07.07", "line_start": 1, "line_end": 2, "quote": "?"}]
        }]),
    );
    write(
        root,
        "records/scene_index/01/broken.json",
        &json!({"scene_id": "01.01.02", "start_line": 9}),
    );
    write(
        root,
        "records/races.json",
        &json!({"Elf": {"canon": true, "source_ref": [{"scene_id": "01.01.01", "line_start": 1, "line_end": 2}]}}),
    );

    let report = run(root, &VerifyOptions::default());
    let all = messages(&report);
    let has = |check: Check, needle: &str| {
        report
            .for_check(check)
            .any(|v| v.to_string().contains(needle))
    };

    assert!(has(Check::Schema, "records/scene_index/01/broken.json"), "{all:#?}");
    assert!(has(Check::Ids, "duplicate event_id 'ev.jake.01.01.01.meditate'"), "{all:#?}");
    assert!(has(Check::Skills, "'Lockpicking' missing from skills catalog"), "{all:#?}");
    assert!(has(Check::Tags, "unknown tag 'pickpocket'"), "{all:#?}");
    assert!(has(Check::Tags, "'stealth' does not allow inferred usage"), "{all:#?}");
    assert!(has(Check::Provenance, "unknown scene '07.07.07'"), "{all:#?}");
    assert!(has(Check::Provenance, "/Elf/source_ref → inline source_ref found"), "{all:#?}");
    assert!(has(Check::Provenance, "end_line must be a non-negative integer"), "{all:#?}");
    assert!(!report.is_ok(false));
}

#[test]
fn only_runs_selected_checks() {
    let dir = clean_dataset();
    write(dir.path(), "records/gear/cloaks.json", &json!({"Cloak": {"tags": ["nope"]}}));
    let mut options = VerifyOptions::default();
    options.only.insert(Check::Ids);
    assert!(run(dir.path(), &options).violations.is_empty());

    options.only.insert(Check::Tags);
    assert_eq!(run(dir.path(), &options).error_count(), 1);
}

#[test]
fn export_mode_rejects_candidate_tags() {
    let dir = clean_dataset();
    write(
        dir.path(),
        "tagging/tag_registry.json",
        &json!({
            "skill_type": [
                {"tag": "meditation", "status": "candidate"}
            ]
        }),
    );
    let draft = run(dir.path(), &VerifyOptions::default());
    assert!(draft.is_ok(false));
    assert!(!draft.is_ok(true));

    let export = VerifyOptions {
        tag_mode: TagMode::Export,
        ..VerifyOptions::default()
    };
    assert!(!run(dir.path(), &export).is_ok(false));
}

#[test]
fn global_timeline_citations_are_checked() {
    let dir = clean_dataset();
    write(
        dir.path(),
        "records/global_event_timeline.json",
        &json!([
            {
                "event_id": "ev.world.01.01.01.bell",
                "scene_id": "01.01.01",
                "order": 1,
                "source_ref": [{
                    "type": "scene",
                    "scene_id": "01.01.01",
                    "line_start": 500,
                    "line_end": 900,
                    "quote": "The bell tolled."
                }]
            },
            {"event_id": "ev.world.01.01.01.quiet", "scene_id": "01.01.01", "order": 2}
        ]),
    );
    let mut options = VerifyOptions::default();
    options.only.insert(Check::Provenance);
    let report = run(dir.path(), &options);
    let found = messages(&report);

    assert_eq!(report.error_count(), 2, "{found:#?}");
    assert!(found.iter().any(|m| {
        m.starts_with("records/global_event_timeline.json: /0/source_ref/0")
            && m.contains("lines 500-900 fall outside scene 01.01.01 [1, 100]")
    }));
    assert!(
        found.contains(&"records/global_event_timeline.json: /1 → missing source_ref[]".to_string())
    );
}
