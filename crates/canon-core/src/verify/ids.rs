//! Event identifier format and uniqueness across all timelines.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::io::read_json;
use crate::model::ids::is_canonical_event_id;
use crate::report::{Check, Report, Severity, Violation, child_pointer};

use super::{Dataset, VerifyOptions};

pub fn check(data: &Dataset<'_>, options: &VerifyOptions, report: &mut Report) {
    // event_id -> "<file><pointer>" of its first definition
    let mut seen: BTreeMap<String, String> = BTreeMap::new();

    for path in data.timeline_sources() {
        let file = data.display(&path);
        let doc = match read_json(&path) {
            Ok(doc) => doc,
            Err(e) => {
                report.push(Violation::error(Check::Ids, &file, "", e.to_string()));
                continue;
            }
        };
        let Some(entries) = doc.as_array() else {
            report.push(Violation::error(
                Check::Ids,
                &file,
                "",
                "expected timeline JSON array",
            ));
            continue;
        };

        for (index, entry) in entries.iter().enumerate() {
            let pointer = child_pointer("", index);
            let Some(obj) = entry.as_object() else {
                report.push(Violation::error(
                    Check::Ids,
                    &file,
                    pointer,
                    "timeline entry must be an object",
                ));
                continue;
            };
            let id_pointer = child_pointer(&pointer, "event_id");
            let event_id = match obj.get("event_id") {
                Some(Value::String(id)) if !id.is_empty() => id,
                None | Some(Value::Null) => {
                    let severity = if options.strict {
                        Severity::Error
                    } else {
                        Severity::Warning
                    };
                    report.push(Violation::new(
                        severity,
                        Check::Ids,
                        &file,
                        pointer,
                        "missing event_id",
                    ));
                    continue;
                }
                Some(other) => {
                    report.push(Violation::error(
                        Check::Ids,
                        &file,
                        id_pointer,
                        format!("event_id must be a non-empty string, got {other}"),
                    ));
                    continue;
                }
            };

            if !is_canonical_event_id(event_id) {
                report.push(Violation::error(
                    Check::Ids,
                    &file,
                    &id_pointer,
                    format!(
                        "event_id '{event_id}' does not match ev.<character>.<BB>.<CC>.<SS>.<slug>"
                    ),
                ));
            }

            let location = format!("{file}{pointer}");
            if let Some(first) = seen.get(event_id) {
                report.push(Violation::error(
                    Check::Ids,
                    &file,
                    id_pointer,
                    format!("duplicate event_id '{event_id}' (first defined at {first})"),
                ));
            } else {
                seen.insert(event_id.clone(), location);
            }
        }
    }
}
