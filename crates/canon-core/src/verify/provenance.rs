//! Citation shape, placement and scene-range containment.
//!
//! Citations live in two places: timeline events (`source_ref[]`) and
//! `.meta.json` sidecars next to the record they describe. Canonical record
//! files must not embed `source_ref` blocks, but any that do are still
//! checked against the scene index so a migration can see what it would
//! move.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use tracing::debug;

use crate::io::read_json;
use crate::model::{SourceKind, SourceRef};
use crate::records::SceneIndex;
use crate::report::{Check, Report, Severity, Violation, child_pointer};
use crate::timeline::parse_citation;
use crate::walk;

use super::{Dataset, InlinePolicy, VerifyOptions};

/// Check a parsed scene citation against the scene index.
///
/// Returns the problem, if any: an unknown scene or a line range that is
/// not fully inside the scene's registered span. Non-scene citations always
/// pass.
#[must_use]
pub fn check_citation(citation: &SourceRef, scenes: &SceneIndex) -> Option<String> {
    if citation.kind != SourceKind::Scene {
        return None;
    }
    let scene = citation.scene_id.as_deref()?;
    let Some(bounds) = scenes.get_raw(scene) else {
        return Some(format!("unknown scene '{scene}' (not in scene index)"));
    };
    let start = citation.line_start?;
    let end = citation.line_end.unwrap_or(start);
    if bounds.contains(start, end) {
        None
    } else {
        Some(format!(
            "lines {start}-{end} fall outside scene {scene} [{}, {}]",
            bounds.start_line, bounds.end_line
        ))
    }
}

pub fn check(data: &Dataset<'_>, options: &VerifyOptions, report: &mut Report) {
    let layout = data.layout;
    let global = layout.global_timeline_file();

    for path in data.timeline_sources() {
        let file = data.display(&path);
        match read_json(&path) {
            Ok(doc) => check_timeline(&doc, data, options, &file, report),
            Err(e) => report.push(Violation::error(Check::Provenance, file, "", e.to_string())),
        }
    }

    for path in walk::json_files(&layout.records) {
        if walk::is_timeline(&path) || path == global || path == layout.tag_registry {
            continue;
        }
        let meta = walk::is_meta_sidecar(&path);
        if !meta && walk::is_sidecar(&path) {
            continue;
        }
        let file = data.display(&path);
        let doc = match read_json(&path) {
            Ok(doc) => doc,
            Err(e) => {
                report.push(Violation::error(Check::Provenance, file, "", e.to_string()));
                continue;
            }
        };
        if meta {
            check_sidecar(&doc, data, &file, report);
        } else {
            let has_sidecar = walk::find_sidecar(&path).is_some();
            debug!(file = %file, has_sidecar, "checking record citations");
            let mut ctx = RecordCheck {
                data,
                options,
                file: &file,
                has_sidecar,
                report: &mut *report,
            };
            ctx.walk(&doc, "");
        }
    }
}

fn check_timeline(
    doc: &Value,
    data: &Dataset<'_>,
    options: &VerifyOptions,
    file: &str,
    report: &mut Report,
) {
    let Some(events) = doc.as_array() else {
        report.push(Violation::error(
            Check::Provenance,
            file,
            "",
            "timeline should be a JSON array of events",
        ));
        return;
    };

    for (i, event) in events.iter().enumerate() {
        let pointer = child_pointer("", i);
        let refs = match event.get("source_ref") {
            Some(Value::Array(refs)) if !refs.is_empty() => refs,
            _ => {
                report.push(Violation::error(
                    Check::Provenance,
                    file,
                    pointer,
                    "missing source_ref[]",
                ));
                continue;
            }
        };
        let refs_pointer = child_pointer(&pointer, "source_ref");
        for (j, raw) in refs.iter().enumerate() {
            check_one(raw, &child_pointer(&refs_pointer, j), data, file, report);
        }

        if options.warn_missing_quote && !has_hint(event, refs) {
            report.push(Violation::warning(
                Check::Provenance,
                file,
                pointer,
                "no quotes or inference hints provided",
            ));
        }
    }
}

/// A quote on any citation, or a truthy `inference` flag on the event or
/// any citation.
fn has_hint(event: &Value, refs: &[Value]) -> bool {
    let truthy = |v: Option<&Value>| match v {
        None | Some(Value::Null | Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    };
    truthy(event.get("inference"))
        || refs
            .iter()
            .any(|r| r.get("quote").is_some() || truthy(r.get("inference")))
}

/// Shape-check and containment-check one raw citation.
fn check_one(
    raw: &Value,
    pointer: &str,
    data: &Dataset<'_>,
    file: &str,
    report: &mut Report,
) {
    let problem = match parse_citation(raw) {
        Ok(citation) => check_citation(&citation, &data.scenes),
        Err(reason) => Some(format!("invalid citation: {reason}")),
    };
    if let Some(message) = problem {
        report.push(Violation::error(Check::Provenance, file, pointer, message));
    }
}

/// Both `{...}` and `[{...}, ...]` forms of an embedded `source_ref`.
fn citations_at<'v>(value: &'v Value, pointer: &str) -> Vec<(String, &'v Value)> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (child_pointer(pointer, i), item))
            .collect(),
        other => vec![(pointer.to_string(), other)],
    }
}

/// Recursive walk over one canonical record file.
struct RecordCheck<'a, 'd> {
    data: &'a Dataset<'d>,
    options: &'a VerifyOptions,
    file: &'a str,
    has_sidecar: bool,
    report: &'a mut Report,
}

impl RecordCheck<'_, '_> {
    fn walk(&mut self, node: &Value, pointer: &str) {
        match node {
            Value::Object(map) => {
                self.object(map, pointer);
                for (key, value) in map {
                    if key != "source_ref" {
                        self.walk(value, &child_pointer(pointer, key));
                    }
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(item, &child_pointer(pointer, i));
                }
            }
            _ => {}
        }
    }

    fn object(&mut self, map: &Map<String, Value>, pointer: &str) {
        let canon = map.get("canon") == Some(&Value::Bool(true));
        let Some(inline) = map.get("source_ref") else {
            if canon && !self.has_sidecar {
                self.report.push(Violation::error(
                    Check::Provenance,
                    self.file,
                    pointer,
                    "canon record must include source_ref or a .meta.json sidecar",
                ));
            }
            return;
        };

        let ref_pointer = child_pointer(pointer, "source_ref");
        let severity = match self.options.inline_source_ref {
            InlinePolicy::Error => Severity::Error,
            InlinePolicy::Warn => Severity::Warning,
        };
        self.report.push(Violation::new(
            severity,
            Check::Provenance,
            self.file,
            &ref_pointer,
            "inline source_ref found; citations belong in timelines or .meta.json sidecars",
        ));

        if canon || self.options.check_non_canon_citations {
            for (p, raw) in citations_at(inline, &ref_pointer) {
                check_one(raw, &p, self.data, self.file, self.report);
            }
        }
    }
}

fn is_timestamp(raw: &str) -> bool {
    DateTime::parse_from_rfc3339(raw).is_ok()
        || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

fn check_sidecar(doc: &Value, data: &Dataset<'_>, file: &str, report: &mut Report) {
    let Some(obj) = doc.as_object() else {
        report.push(Violation::error(
            Check::Provenance,
            file,
            "",
            "sidecar must be a JSON object",
        ));
        return;
    };

    match obj.get("record_log") {
        None => {}
        Some(Value::Array(log)) => check_record_log(log, file, report),
        Some(_) => report.push(Violation::error(
            Check::Provenance,
            file,
            "/record_log",
            "record_log must be an array",
        )),
    }

    if let Some(source) = obj.get("source").and_then(Value::as_object)
        && let Some(scene) = source.get("scene_id").and_then(Value::as_str)
    {
        let line = |key: &str| source.get(key).and_then(Value::as_u64);
        let start = line("line_start").or_else(|| line("line"));
        let end = line("line_end").or(start);
        let problem = match (data.scenes.get_raw(scene), start, end) {
            (None, ..) => Some(format!("unknown scene '{scene}' (not in scene index)")),
            (Some(bounds), Some(s), Some(e)) if !bounds.contains(s, e) => Some(format!(
                "lines {s}-{e} fall outside scene {scene} [{}, {}]",
                bounds.start_line, bounds.end_line
            )),
            _ => None,
        };
        if let Some(message) = problem {
            report.push(Violation::error(Check::Provenance, file, "/source", message));
        }
    }

    if let Some(inline) = obj.get("source_ref") {
        for (p, raw) in citations_at(inline, "/source_ref") {
            check_one(raw, &p, data, file, report);
        }
    }
}

fn check_record_log(log: &[Value], file: &str, report: &mut Report) {
    for (i, entry) in log.iter().enumerate() {
        let pointer = child_pointer("/record_log", i);
        let Some(entry) = entry.as_object() else {
            report.push(Violation::error(
                Check::Provenance,
                file,
                pointer,
                "record_log entry must be an object",
            ));
            continue;
        };
        let (Some(timestamp), Some(_)) = (entry.get("timestamp"), entry.get("action")) else {
            report.push(Violation::error(
                Check::Provenance,
                file,
                pointer,
                "record_log entry missing 'timestamp' or 'action'",
            ));
            continue;
        };
        if !timestamp.as_str().is_some_and(is_timestamp) {
            report.push(Violation::warning(
                Check::Provenance,
                file,
                child_pointer(&pointer, "timestamp"),
                format!("unparseable timestamp {timestamp}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use crate::records::SceneBounds;
    use crate::model::SceneId;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    fn scenes(end_line: u64) -> SceneIndex {
        let mut index = SceneIndex::default();
        index.insert(
            SceneId::parse("01.01.01").expect("scene id"),
            SceneBounds {
                start_line: 1,
                end_line,
            },
        );
        index
    }

    #[test]
    fn containment_against_scene_bounds() {
        let citation = SourceRef::scene("01.01.01", 10, 20);
        assert_eq!(check_citation(&citation, &scenes(100)), None);
        let msg = check_citation(&citation, &scenes(15)).expect("outside");
        assert_eq!(msg, "lines 10-20 fall outside scene 01.01.01 [1, 15]");

        let unknown = SourceRef::scene("02.01.01", 1, 2);
        assert!(check_citation(&unknown, &scenes(100)).expect("unknown").contains("unknown scene"));

        let mut wiki = SourceRef::scene("09.09.09", 1, 2);
        wiki.kind = SourceKind::Wiki;
        assert_eq!(check_citation(&wiki, &scenes(100)), None);
    }

    #[test]
    fn timestamps() {
        assert!(is_timestamp("2024-05-01T12:00:00Z"));
        assert!(is_timestamp("2024-05-01T12:00:00+02:00"));
        assert!(is_timestamp("2024-05-01T12:00:00"));
        assert!(is_timestamp("2024-05-01"));
        assert!(!is_timestamp("yesterday"));
    }

    fn write(root: &Path, rel: &str, v: &Value) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, v.to_string()).expect("write");
    }

    fn run(root: &Path, options: &VerifyOptions) -> Report {
        let layout = Layout::new(root);
        let data = Dataset::load(&layout);
        let mut report = Report::new();
        check(&data, options, &mut report);
        report
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        write(
            root,
            "records/scene_index/01/01.01.01.json",
            &json!({"scene_id": "01.01.01", "start_line": 1, "end_line": 100}),
        );
        write(
            root,
            "records/characters/jake/timeline.json",
            &json!([
                {"event_id": "ev.jake.01.01.01.a", "source_ref": [
                    {"type": "scene", "scene_id": "01-01-01", "line_start": 10, "line_end": 20, "quote": "..."}
                ]},
                {"event_id": "ev.jake.01.01.01.b", "source_ref": [
                    {"type": "scene", "scene_id": "01.01.01", "line_start": 90, "line_end": 120}
                ]},
                {"event_id": "ev.jake.01.01.01.c"}
            ]),
        );
        dir
    }

    #[test]
    fn timeline_citations_and_hints() {
        let dir = fixture();
        let report = run(dir.path(), &VerifyOptions::default());
        let messages: Vec<String> = report.violations.iter().map(ToString::to_string).collect();
        assert_eq!(report.error_count(), 2, "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("/1/source_ref/0 → lines 90-120 fall outside")));
        assert!(messages.iter().any(|m| m.contains("/2 → missing source_ref[]")));
        assert_eq!(report.warning_count(), 1);
        assert!(messages.iter().any(|m| m.contains("/1 → no quotes or inference hints")));

        let quiet = VerifyOptions {
            warn_missing_quote: false,
            ..VerifyOptions::default()
        };
        assert_eq!(run(dir.path(), &quiet).warning_count(), 0);
    }

    #[test]
    fn canon_records_need_a_citation_somewhere() {
        let dir = fixture();
        let root = dir.path();
        write(
            root,
            "records/equipment.json",
            &json!({
                "Bow": {"canon": true},
                "Sword": {"canon": true, "source_ref": {"scene_id": "01-01-01", "line_start": 999, "line_end": 1000}},
                "Rumour": {"canon": false}
            }),
        );
        write(root, "records/races.json", &json!({"Elf": {"canon": true}}));
        write(
            root,
            "records/races.meta.json",
            &json!({"record_log": [{"timestamp": "2024-05-01", "action": "created"}]}),
        );

        let report = run(root, &VerifyOptions::default());
        let equipment: Vec<&Violation> = report
            .violations
            .iter()
            .filter(|v| v.file == "records/equipment.json")
            .collect();
        assert_eq!(equipment.len(), 3, "{equipment:#?}");
        assert!(equipment.iter().any(|v| v.pointer == "/Bow"
            && v.message.contains("must include source_ref")));
        assert!(equipment.iter().any(|v| v.pointer == "/Sword/source_ref"
            && v.message.starts_with("inline source_ref")));
        assert!(equipment.iter().any(|v| v.message.contains("fall outside")));
        assert!(report.violations.iter().all(|v| !v.file.starts_with("records/races")));

        let migrating = VerifyOptions {
            inline_source_ref: InlinePolicy::Warn,
            ..VerifyOptions::default()
        };
        let report = run(root, &migrating);
        let inline = report
            .violations
            .iter()
            .find(|v| v.message.starts_with("inline source_ref"))
            .expect("inline finding");
        assert_eq!(inline.severity, Severity::Warning);
    }

    #[test]
    fn sidecar_log_and_source() {
        let dir = fixture();
        let root = dir.path();
        write(root, "records/zone_lore.json", &json!({"Forest": {"canon": true}}));
        write(
            root,
            "records/zone_lore.json.meta.json",
            &json!({
                "source": {"scene_id": "01.01.01", "line": 150},
                "record_log": [
                    {"timestamp": "last week", "action": "edited"},
                    {"action": "created"},
                    "note"
                ]
            }),
        );
        let report = run(root, &VerifyOptions::default());
        let sidecar: Vec<&Violation> = report
            .violations
            .iter()
            .filter(|v| v.file == "records/zone_lore.json.meta.json")
            .collect();
        assert_eq!(sidecar.len(), 4, "{sidecar:#?}");
        assert!(sidecar.iter().any(|v| v.pointer == "/source"
            && v.message == "lines 150-150 fall outside scene 01.01.01 [1, 100]"));
        assert!(sidecar.iter().any(|v| v.pointer == "/record_log/0/timestamp" && !v.is_error()));
        assert!(sidecar.iter().any(|v| v.pointer == "/record_log/1" && v.is_error()));
        assert!(sidecar.iter().any(|v| v.pointer == "/record_log/2" && v.is_error()));
    }
}
