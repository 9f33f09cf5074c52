//! Skill references against the skills catalog.
//!
//! Two places name skills: timeline entries (`skills: [...]`) and per
//! character `known_skills.json` ledgers.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::io::read_json;
use crate::records::SkillCatalog;
use crate::report::{Check, Report, Violation, child_pointer};

use super::Dataset;

const LEDGER: &str = "known_skills.json";

pub fn check(data: &Dataset<'_>, report: &mut Report) {
    let layout = data.layout;
    let timelines = layout.timeline_files();
    let ledgers = character_ledgers(&layout.characters_dir());

    if timelines.is_empty() && ledgers.is_empty() {
        return;
    }
    let Some(catalog) = &data.skills else {
        let skills_file = layout.skills_file();
        if !skills_file.is_file() {
            report.push(Violation::warning(
                Check::Skills,
                data.display(&skills_file),
                "",
                "skills catalog not found; skill references not checked",
            ));
        }
        return;
    };

    for path in &timelines {
        let file = data.display(path);
        if let Ok(doc) = read_json(path) {
            check_timeline_skills(&doc, catalog, &file, report);
        }
    }
    for path in &ledgers {
        let file = data.display(path);
        match read_json(path) {
            Ok(doc) => check_ledger(&doc, catalog, data, &file, report),
            Err(e) => report.push(Violation::error(Check::Skills, file, "", e.to_string())),
        }
    }
}

/// Every `records/characters/*/known_skills.json` that exists, sorted.
fn character_ledgers(characters: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(characters) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path().join(LEDGER))
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}

fn check_timeline_skills(doc: &Value, catalog: &SkillCatalog, file: &str, report: &mut Report) {
    let Some(entries) = doc.as_array() else {
        return;
    };
    for (i, entry) in entries.iter().enumerate() {
        let Some(skills) = entry.get("skills").and_then(Value::as_array) else {
            continue;
        };
        for (j, skill) in skills.iter().enumerate() {
            let pointer = child_pointer(&child_pointer(&child_pointer("", i), "skills"), j);
            match skill.as_str() {
                Some(name) if catalog.resolve(name).is_some() => {}
                Some(name) => report.push(Violation::error(
                    Check::Skills,
                    file,
                    pointer,
                    format!("'{name}' missing from skills catalog"),
                )),
                None => report.push(Violation::error(
                    Check::Skills,
                    file,
                    pointer,
                    "skill reference must be a string",
                )),
            }
        }
    }
}

fn check_ledger(
    doc: &Value,
    catalog: &SkillCatalog,
    data: &Dataset<'_>,
    file: &str,
    report: &mut Report,
) {
    let Some(obj) = doc.as_object() else {
        report.push(Violation::error(
            Check::Skills,
            file,
            "",
            "known_skills ledger must be an object",
        ));
        return;
    };

    // Top-level `{name: {rarity}}` entries must match the catalog.
    for (name, meta) in obj {
        if name == "acquisitions" || !meta.is_object() {
            continue;
        }
        let pointer = child_pointer("", name);
        let Some(record) = catalog.record(name) else {
            report.push(Violation::error(
                Check::Skills,
                file,
                pointer,
                format!("unknown skill '{name}' (not in skills catalog)"),
            ));
            continue;
        };
        let got = meta.get("rarity");
        let expected = record.get("rarity");
        if let (Some(got), Some(expected)) = (got, expected)
            && got != expected
        {
            report.push(Violation::error(
                Check::Skills,
                file,
                child_pointer(&pointer, "rarity"),
                format!("rarity mismatch for '{name}': got {got}, expected {expected}"),
            ));
        }
    }

    let Some(acquisitions) = obj.get("acquisitions") else {
        return;
    };
    let Some(acquisitions) = acquisitions.as_array() else {
        report.push(Violation::error(
            Check::Skills,
            file,
            "/acquisitions",
            "'acquisitions' is not a list",
        ));
        return;
    };

    for (i, entry) in acquisitions.iter().enumerate() {
        let pointer = child_pointer("/acquisitions", i);
        let skill = entry.get("skill").and_then(Value::as_str);
        if !skill.is_some_and(|s| catalog.resolve(s).is_some()) {
            report.push(Violation::error(
                Check::Skills,
                file,
                child_pointer(&pointer, "skill"),
                format!(
                    "unknown skill {} (not in skills catalog)",
                    entry.get("skill").map_or_else(|| "(missing)".to_string(), Value::to_string)
                ),
            ));
        }

        let at = entry.get("at");
        let scene = at.and_then(|a| a.get("scene_id")).and_then(Value::as_str);
        if !scene.is_some_and(|s| data.scenes.get_raw(s).is_some()) {
            report.push(Violation::error(
                Check::Skills,
                file,
                child_pointer(&child_pointer(&pointer, "at"), "scene_id"),
                format!("missing scene '{}' in scene index", scene.unwrap_or_default()),
            ));
        }
        if let Some(line) = at.and_then(|a| a.get("line"))
            && !(line.is_u64() || line.is_i64())
        {
            report.push(Violation::error(
                Check::Skills,
                file,
                child_pointer(&child_pointer(&pointer, "at"), "line"),
                format!("non-integer line {line}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Layout;
    use crate::verify::Dataset;
    use serde_json::json;
    use std::fs;

    fn write(root: &Path, rel: &str, v: &Value) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, v.to_string()).expect("write");
    }

    #[test]
    fn timeline_and_ledger_references() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        write(
            root,
            "records/skills.json",
            &json!({"Meditation (Common)": {"rarity": "Common"}, "Archery": {"rarity": "Inferior"}}),
        );
        write(
            root,
            "records/scene_index/01.01.01.json",
            &json!({"scene_id": "01.01.01", "start_line": 1, "end_line": 50}),
        );
        write(
            root,
            "records/characters/jake/timeline.json",
            &json!([{"skills": ["Meditation", "Archery", "Stealth"]}]),
        );
        write(
            root,
            "records/characters/jake/known_skills.json",
            &json!({
                "Archery": {"rarity": "Common"},
                "acquisitions": [
                    {"skill": "Archery", "at": {"scene_id": "01.01.01", "line": 12}},
                    {"skill": "Lockpicking", "at": {"scene_id": "09.09.09", "line": "twelve"}}
                ]
            }),
        );

        let layout = Layout::new(root);
        let data = Dataset::load(&layout);
        let mut report = Report::new();
        check(&data, &mut report);

        let messages: Vec<String> = report.violations.iter().map(ToString::to_string).collect();
        assert_eq!(report.error_count(), 5, "{messages:#?}");
        assert!(messages.iter().any(|m| m.contains("/0/skills/2 → 'Stealth' missing")));
        assert!(messages.iter().any(|m| m.contains("rarity mismatch for 'Archery'")));
        assert!(messages.iter().any(|m| m.contains("/acquisitions/1/skill")));
        assert!(messages.iter().any(|m| m.contains("missing scene '09.09.09'")));
        assert!(messages.iter().any(|m| m.contains("non-integer line")));
    }

    #[test]
    fn missing_catalog_warns_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            dir.path(),
            "records/characters/jake/timeline.json",
            &json!([{"skills": ["Meditation"]}]),
        );
        let layout = Layout::new(dir.path());
        let data = Dataset::load(&layout);
        let mut report = Report::new();
        check(&data, &mut report);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.error_count(), 0);
    }
}
