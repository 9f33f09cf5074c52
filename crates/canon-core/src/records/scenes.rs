//! Scene index: `scene_id -> [start_line, end_line]`.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::io::read_json;
use crate::model::SceneId;
use crate::report::{Check, Violation};
use crate::walk;

/// Registered line span of a scene, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneBounds {
    pub start_line: u64,
    pub end_line: u64,
}

impl SceneBounds {
    /// Returns `true` if `start..=end` lies fully inside these bounds.
    #[must_use]
    pub const fn contains(self, start: u64, end: u64) -> bool {
        start >= self.start_line && end <= self.end_line && start <= end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneIndex {
    scenes: BTreeMap<SceneId, SceneBounds>,
}

impl SceneIndex {
    /// Load every scene file under `dir` (sidecars skipped).
    ///
    /// Malformed scene files do not abort the load. Each becomes a
    /// provenance violation and the scene is left out of the index.
    #[must_use]
    pub fn load(dir: &Path, repo_root: &Path) -> (Self, Vec<Violation>) {
        let mut index = Self::default();
        let mut violations = Vec::new();

        for path in walk::json_files(dir) {
            if walk::is_sidecar(&path) {
                continue;
            }
            let file = path
                .strip_prefix(repo_root)
                .unwrap_or(&path)
                .display()
                .to_string();
            let doc = match read_json(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    violations.push(Violation::error(Check::Provenance, &file, "", e.to_string()));
                    continue;
                }
            };
            if let Err((pointer, message)) = index.insert_doc(&doc) {
                violations.push(Violation::error(Check::Provenance, &file, pointer, message));
            }
        }

        debug!(dir = %dir.display(), scenes = index.scenes.len(), "loaded scene index");
        (index, violations)
    }

    fn insert_doc(&mut self, doc: &Value) -> Result<(), (&'static str, String)> {
        let raw = doc
            .get("scene_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ("/scene_id", "scene file needs a string scene_id".to_string()))?;
        let id = SceneId::parse(raw).map_err(|e| ("/scene_id", e.to_string()))?;

        let line = |key: &str, pointer: &'static str| {
            doc.get(key)
                .and_then(Value::as_u64)
                .ok_or_else(|| (pointer, format!("{key} must be a non-negative integer")))
        };
        let bounds = SceneBounds {
            start_line: line("start_line", "/start_line")?,
            end_line: line("end_line", "/end_line")?,
        };
        if bounds.start_line > bounds.end_line {
            return Err((
                "",
                format!(
                    "scene {id}: start_line {} > end_line {}",
                    bounds.start_line, bounds.end_line
                ),
            ));
        }
        if self.scenes.contains_key(&id) {
            return Err(("/scene_id", format!("duplicate scene {id}")));
        }
        self.insert(id, bounds);
        Ok(())
    }

    pub fn insert(&mut self, id: SceneId, bounds: SceneBounds) {
        self.scenes.insert(id, bounds);
    }

    #[must_use]
    pub fn get(&self, id: &SceneId) -> Option<SceneBounds> {
        self.scenes.get(id).copied()
    }

    /// Look up a raw scene id in either accepted spelling.
    #[must_use]
    pub fn get_raw(&self, raw: &str) -> Option<SceneBounds> {
        SceneId::parse(raw).ok().and_then(|id| self.get(&id))
    }
}
