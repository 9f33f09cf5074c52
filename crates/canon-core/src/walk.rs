//! Dataset tree walking.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

const SIDECAR_SUFFIXES: [&str; 3] = [".meta.json", ".review.json", ".provenance.json"];

/// Every `*.json` file under `root`, sorted by path.
///
/// Hidden entries and in-flight `.temp.*` files from atomic writes are
/// skipped. A missing root yields an empty list.
#[must_use]
pub fn json_files(root: &Path) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.into_path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    files.push(path);
                }
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "skipping unreadable entry"),
        }
    }
    files.sort();
    files
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `foo.meta.json` / `foo.json.meta.json` provenance sidecars.
#[must_use]
pub fn is_meta_sidecar(path: &Path) -> bool {
    file_name(path).ends_with(".meta.json")
}

/// Any sidecar kind excluded from record-content checks.
#[must_use]
pub fn is_sidecar(path: &Path) -> bool {
    let name = file_name(path);
    SIDECAR_SUFFIXES.iter().any(|s| name.ends_with(s))
}

#[must_use]
pub fn is_timeline(path: &Path) -> bool {
    file_name(path) == "timeline.json"
}

/// Candidate sidecar paths for a record file, most specific first.
#[must_use]
pub fn sidecar_candidates(record: &Path) -> [PathBuf; 2] {
    let name = file_name(record);
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    [
        record.with_file_name(format!("{name}.meta.json")),
        record.with_file_name(format!("{stem}.meta.json")),
    ]
}

/// The sidecar that exists for `record`, if any.
#[must_use]
pub fn find_sidecar(record: &Path) -> Option<PathBuf> {
    sidecar_candidates(record).into_iter().find(|p| p.is_file())
}
