//! JSON-Schema conformance of canonical files.
//!
//! Every `*.json` under the schema root is registered with the compiler
//! twice: under its own `$id` (when present) and under
//! `json-schema:///<relative path>`, the base URI `jsonschema` assigns to a
//! schema without `$id`. Each schema is compiled under that same base, so
//! relative `$ref`s resolve from its own directory and from memory without
//! touching the network.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::{debug, warn};

use crate::io::read_json;
use crate::report::{Check, Report, Violation};
use crate::walk;

use super::Dataset;

/// Record files with a fixed schema, relative to the records root.
pub const FILE_TO_SCHEMA: [(&str, &str); 11] = [
    ("skills.json", "skills.schema.json"),
    ("equipment.json", "equipment.schema.json"),
    ("races.json", "races.schema.json"),
    ("system_glossary.json", "system_glossary.schema.json"),
    ("zone_lore.json", "zone_lore.schema.json"),
    ("stat_scaling.json", "stat_scaling.schema.json"),
    ("global_event_timeline.json", "global_event_timeline.schema.json"),
    ("global_announcement_log.json", "global_announcement_log.schema.json"),
    ("chapters_to_posts.json", "chapters_to_posts.schema.json"),
    ("aliases/character_aliases.json", "aliases.schema.json"),
    ("aliases/entity_aliases.json", "aliases.schema.json"),
];

pub const TIMELINE_SCHEMA: &str = "character_timeline.schema.json";
pub const SCENE_SCHEMA: &str = "scene_index.schema.json";
pub const META_SCHEMA: &str = "file_metadata.schema.json";
pub const TAG_REGISTRY_SCHEMA: &str = "tag_registry.schema.json";

const BASE_URI: &str = "json-schema:///";

/// All schema documents under one root, plus a per-name compile cache.
pub struct SchemaStore {
    root: PathBuf,
    documents: Vec<(String, Value)>,
    by_name: BTreeMap<String, Value>,
    compiled: BTreeMap<String, Result<JSONSchema, String>>,
    /// Schema files that failed to load: `(relative path, message)`.
    pub load_errors: Vec<(String, String)>,
}

impl SchemaStore {
    #[must_use]
    pub fn load(root: &Path) -> Self {
        let mut store = Self {
            root: root.to_path_buf(),
            documents: Vec::new(),
            by_name: BTreeMap::new(),
            compiled: BTreeMap::new(),
            load_errors: Vec::new(),
        };
        for path in walk::json_files(root) {
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            match read_json(&path) {
                Ok(doc) => {
                    if let Some(id) = doc.get("$id").and_then(Value::as_str) {
                        store.documents.push((id.to_string(), doc.clone()));
                    }
                    store.documents.push((format!("{BASE_URI}{rel}"), doc.clone()));
                    store.by_name.insert(rel, doc);
                }
                Err(e) => store.load_errors.push((rel, e.to_string())),
            }
        }
        debug!(root = %root.display(), schemas = store.by_name.len(), "loaded schema store");
        store
    }

    /// Compile (once) the schema at `name`, relative to the schema root.
    /// `None` when no such schema file exists.
    pub fn get(&mut self, name: &str) -> Option<&Result<JSONSchema, String>> {
        if !self.compiled.contains_key(name) {
            let doc = self.by_name.get(name)?;
            let doc = with_base_id(doc, name);
            let mut options = JSONSchema::options();
            for (id, shared) in &self.documents {
                options.with_document(id.clone(), shared.clone());
            }
            let compiled = options.compile(&doc).map_err(|e| e.to_string());
            self.compiled.insert(name.to_string(), compiled);
        }
        self.compiled.get(name)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// `doc` with an id of `json-schema:///<name>` unless it declares its own,
/// so relative `$ref`s resolve from the schema's own directory.
fn with_base_id(doc: &Value, name: &str) -> Value {
    let mut doc = doc.clone();
    let draft4 = doc
        .get("$schema")
        .and_then(Value::as_str)
        .is_some_and(|uri| uri.contains("draft-04"));
    let key = if draft4 { "id" } else { "$id" };
    if let Some(map) = doc.as_object_mut() {
        map.entry(key)
            .or_insert_with(|| Value::String(format!("{BASE_URI}{name}")));
    }
    doc
}

/// Validate `instance` against the schema at `name`. Findings go into
/// `report` under `file`.
pub fn validate_against(
    store: &mut SchemaStore,
    name: &str,
    instance: &Value,
    file: &str,
    report: &mut Report,
) {
    match store.get(name) {
        None => report.push(Violation::warning(
            Check::Schema,
            file,
            "",
            format!("schema {name} not found; skipped"),
        )),
        Some(Err(e)) => report.push(Violation::error(
            Check::Schema,
            file,
            "",
            format!("schema {name} does not compile: {e}"),
        )),
        Some(Ok(compiled)) => {
            if let Err(errors) = compiled.validate(instance) {
                for e in errors {
                    report.push(Violation::error(
                        Check::Schema,
                        file,
                        e.instance_path.to_string(),
                        e.to_string(),
                    ));
                }
            }
        }
    }
}

/// Every `(file, schema name)` pair the schema pass covers, in a stable
/// order: fixed files, timelines, scene files, sidecars, tag registry.
fn targets(data: &Dataset<'_>) -> Vec<(PathBuf, &'static str)> {
    let layout = data.layout;
    let mut out: Vec<(PathBuf, &'static str)> = FILE_TO_SCHEMA
        .iter()
        .map(|(file, schema)| (layout.records.join(file), *schema))
        .filter(|(path, _)| path.is_file())
        .collect();

    out.extend(layout.timeline_files().into_iter().map(|p| (p, TIMELINE_SCHEMA)));
    out.extend(
        walk::json_files(&layout.scene_index_dir())
            .into_iter()
            .filter(|p| !walk::is_sidecar(p))
            .map(|p| (p, SCENE_SCHEMA)),
    );
    out.extend(
        walk::json_files(&layout.records)
            .into_iter()
            .filter(|p| walk::is_meta_sidecar(p))
            .map(|p| (p, META_SCHEMA)),
    );
    if layout.tag_registry.is_file() {
        out.push((layout.tag_registry.clone(), TAG_REGISTRY_SCHEMA));
    }
    out
}

pub fn check(data: &Dataset<'_>, report: &mut Report) {
    let targets = targets(data);
    if targets.is_empty() {
        return;
    }

    let mut store = SchemaStore::load(&data.layout.schemas);
    for (rel, message) in &store.load_errors {
        let path = store.root().join(rel);
        report.push(Violation::error(Check::Schema, data.display(&path), "", message.as_str()));
    }
    if store.by_name.is_empty() {
        warn!(schemas = %data.layout.schemas.display(), "no schemas found");
    }

    for (path, schema) in targets {
        let file = data.display(&path);
        match read_json(&path) {
            Ok(instance) => validate_against(&mut store, schema, &instance, &file, report),
            Err(e) => report.push(Violation::error(Check::Schema, file, "", e.to_string())),
        }
    }
}
