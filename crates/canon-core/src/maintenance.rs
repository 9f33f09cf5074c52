//! Dataset upkeep: timeline re-sorting and the scene id migration.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Layout;
use crate::io::{WriteOptions, read_json, write_json_atomic};
use crate::model::SceneId;
use crate::model::scene::is_legacy_scene_id;
use crate::walk;

/// On-disk order of a raw timeline entry: canonical scene, `day`, `order`,
/// `event_id`. Missing fields sort first.
fn entry_cmp(a: &Value, b: &Value) -> Ordering {
    let scene = |v: &Value| {
        v.get("scene_id")
            .and_then(Value::as_str)
            .map(|raw| SceneId::parse(raw).map_or_else(|_| raw.to_string(), |id| id.to_string()))
            .unwrap_or_default()
    };
    let num = |v: &Value, key: &str| v.get(key).and_then(Value::as_u64).unwrap_or(0);
    let id = |v: &Value| {
        v.get("event_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    scene(a)
        .cmp(&scene(b))
        .then_with(|| num(a, "day").cmp(&num(b, "day")))
        .then_with(|| num(a, "order").cmp(&num(b, "order")))
        .then_with(|| id(a).cmp(&id(b)))
}

/// Re-sort the timeline of `character_id` on disk.
///
/// The sort is stable and entries are otherwise untouched. Returns `true`
/// if the order changed (and the file was rewritten).
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, or is not a JSON
/// array.
pub fn sort_timeline(layout: &Layout, character_id: &str) -> Result<bool> {
    let path = layout.timeline_path(character_id);
    let doc = read_json(&path)?;
    let Value::Array(entries) = doc else {
        bail!("{}: expected timeline JSON array", layout.display(&path));
    };

    let mut sorted = entries.clone();
    sorted.sort_by(entry_cmp);
    if sorted == entries {
        debug!(path = %path.display(), "timeline already sorted");
        return Ok(false);
    }

    write_json_atomic(&path, &Value::Array(sorted), WriteOptions::default())
        .with_context(|| format!("failed to rewrite {}", layout.display(&path)))?;
    info!(path = %path.display(), events = entries.len(), "timeline re-sorted");
    Ok(true)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// 1-based line numbers of `text` containing a hyphenated scene id
/// (`BB-CC-SS` as a whole word).
#[must_use]
pub fn scan_hyphenated_scene_ids(text: &str) -> Vec<usize> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| line_has_hyphenated_id(line))
        .map(|(i, _)| i + 1)
        .collect()
}

fn line_has_hyphenated_id(line: &str) -> bool {
    const SHAPE: &[u8; 8] = b"dd-dd-dd";
    let chars: Vec<char> = line.chars().collect();
    chars.windows(SHAPE.len()).enumerate().any(|(start, window)| {
        let shaped = window.iter().zip(SHAPE).all(|(&c, &s)| match s {
            b'd' => c.is_ascii_digit(),
            _ => c == '-',
        });
        let before = start.checked_sub(1).map(|i| chars[i]);
        let after = chars.get(start + SHAPE.len()).copied();
        shaped && !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Files touched by [`migrate_scene_ids`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Migration {
    /// Files containing at least one legacy id, relative to the repo root.
    pub changed: Vec<String>,
    /// Number of `scene_id` values rewritten.
    pub rewritten: usize,
}

/// Rewrite every legacy string under a `scene_id` key, at any depth.
fn canonicalise(node: &mut Value) -> usize {
    match node {
        Value::Object(map) => map
            .iter_mut()
            .map(|(key, value)| {
                if key == "scene_id"
                    && let Value::String(raw) = value
                    && is_legacy_scene_id(raw)
                    && let Ok(id) = SceneId::parse(raw)
                {
                    *value = Value::String(id.to_string());
                    1
                } else {
                    canonicalise(value)
                }
            })
            .sum(),
        Value::Array(items) => items.iter_mut().map(canonicalise).sum(),
        _ => 0,
    }
}

/// Canonicalise scene ids across the records tree.
///
/// With `dry_run` nothing is written; the returned [`Migration`] lists what
/// would change.
///
/// # Errors
///
/// Returns an error if a record file cannot be parsed or rewritten.
pub fn migrate_scene_ids(layout: &Layout, dry_run: bool) -> Result<Migration> {
    let mut migration = Migration::default();
    for path in walk::json_files(&layout.records) {
        let mut doc = read_json(&path)?;
        let count = canonicalise(&mut doc);
        if count == 0 {
            continue;
        }
        if !dry_run {
            write_json_atomic(&path, &doc, WriteOptions::default())
                .with_context(|| format!("failed to rewrite {}", layout.display(&path)))?;
        }
        debug!(path = %path.display(), count, dry_run, "scene ids canonicalised");
        migration.changed.push(layout.display(&path));
        migration.rewritten += count;
    }
    info!(
        files = migration.changed.len(),
        rewritten = migration.rewritten,
        dry_run,
        "scene id migration finished"
    );
    Ok(migration)
}

/// Files to lint when no explicit list is given: every record JSON file.
#[must_use]
pub fn default_lint_targets(layout: &Layout) -> Vec<PathBuf> {
    walk::json_files(&layout.records)
}

/// Lint one file for hyphenated scene ids. Unreadable or non-UTF-8 files
/// yield no findings.
#[must_use]
pub fn lint_file(path: &Path) -> Vec<usize> {
    std::fs::read_to_string(path)
        .map(|text| scan_hyphenated_scene_ids(&text))
        .unwrap_or_default()
}
