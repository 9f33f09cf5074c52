//! Tag usage across every record file.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::io::read_json;
use crate::model::ids::is_snake_case;
use crate::records::{Resolution, TagRegistry, TagStatus};
use crate::report::{Check, Report, Violation, child_pointer};
use crate::walk;

use super::{AliasPolicy, Dataset, TagMode, VerifyOptions};

/// One entry of a `tags` array, with its pointer.
struct TagUse<'a> {
    pointer: String,
    value: &'a Value,
}

/// Collect every `tags` array entry in `doc`. Tag arrays are not searched
/// for nested `tags` keys.
fn collect<'a>(node: &'a Value, pointer: &str, out: &mut Vec<TagUse<'a>>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                let child = child_pointer(pointer, key);
                match value {
                    Value::Array(items) if key == "tags" => {
                        out.extend(items.iter().enumerate().map(|(i, value)| TagUse {
                            pointer: child_pointer(&child, i),
                            value,
                        }));
                    }
                    _ => collect(value, &child, out),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, &child_pointer(pointer, i), out);
            }
        }
        _ => {}
    }
}

/// `"name"` or `{"tag": "name", "inferred": bool}`.
fn tag_text(value: &Value) -> Option<(&str, bool)> {
    match value {
        Value::String(s) => Some((s, false)),
        Value::Object(obj) => {
            let tag = obj.get("tag")?.as_str()?;
            let inferred = obj.get("inferred").and_then(Value::as_bool).unwrap_or(false);
            Some((tag, inferred))
        }
        _ => None,
    }
}

fn is_well_formed(tag: &str) -> bool {
    tag.strip_prefix("tag.")
        .unwrap_or(tag)
        .split('.')
        .all(is_snake_case)
}

pub fn check(data: &Dataset<'_>, options: &VerifyOptions, report: &mut Report) {
    let Some(registry) = &data.registry else {
        return;
    };
    for path in walk::json_files(&data.layout.records) {
        if walk::is_sidecar(&path) || path == data.layout.tag_registry {
            continue;
        }
        let Ok(doc) = read_json(&path) else {
            debug!(path = %path.display(), "unreadable record skipped by tag check");
            continue;
        };
        check_document(&doc, registry, options, &data.display(&path), report);
    }
}

/// Tag findings for one record document.
pub fn check_document(
    doc: &Value,
    registry: &TagRegistry,
    options: &VerifyOptions,
    file: &str,
    report: &mut Report,
) {
    let mut uses = Vec::new();
    collect(doc, "", &mut uses);
    let mut per_category: BTreeMap<&str, usize> = BTreeMap::new();

    for TagUse { pointer, value } in uses {
        let Some((raw, inferred)) = tag_text(value) else {
            report.push(Violation::error(
                Check::Tags,
                file,
                pointer,
                format!("non-string tag value {value}"),
            ));
            continue;
        };
        let tag = raw.trim();
        if tag.is_empty() {
            report.push(Violation::error(Check::Tags, file, pointer, "empty tag string"));
            continue;
        }
        if !is_well_formed(tag) {
            report.push(Violation::error(
                Check::Tags,
                file,
                &pointer,
                format!("tag '{tag}' must be lowercase snake_case"),
            ));
        }

        let Some(resolution) = registry.resolve(tag) else {
            report.push(Violation::error(
                Check::Tags,
                file,
                pointer,
                format!("unknown tag '{tag}'"),
            ));
            continue;
        };
        let entry = resolution.entry();

        if matches!(resolution, Resolution::Alias(_)) && options.alias_policy == AliasPolicy::Warn {
            report.push(Violation::warning(
                Check::Tags,
                file,
                &pointer,
                format!("alias '{tag}' used; replace with canonical tag '{}'", entry.id),
            ));
        }

        match (&entry.status, options.tag_mode) {
            (TagStatus::Candidate, TagMode::Draft) => report.push(Violation::warning(
                Check::Tags,
                file,
                &pointer,
                format!("candidate tag '{}'", entry.id),
            )),
            (TagStatus::Candidate, TagMode::Export) => report.push(Violation::error(
                Check::Tags,
                file,
                &pointer,
                format!("candidate tag '{}' not allowed in export mode", entry.id),
            )),
            (status, TagMode::Export) if !status.is_approved() => {
                report.push(Violation::error(
                    Check::Tags,
                    file,
                    &pointer,
                    format!("non-approved tag '{}' (status {status})", entry.id),
                ));
            }
            _ => {}
        }

        if inferred && !entry.allow_inferred {
            report.push(Violation::error(
                Check::Tags,
                file,
                &pointer,
                format!("tag '{}' does not allow inferred usage", entry.id),
            ));
        }

        if let Some(category) = &entry.category {
            *per_category.entry(category.as_str()).or_default() += 1;
        }
    }

    for (category, count) in per_category {
        if let Some(&limit) = options.category_limits.get(category)
            && count > limit
        {
            report.push(Violation::error(
                Check::Tags,
                file,
                "",
                format!("{category} tag limit exceeded ({count} > {limit})"),
            ));
        }
    }
}
