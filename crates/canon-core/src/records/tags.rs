//! Tag registry: the controlled vocabulary of classification tags.
//!
//! Two document shapes exist and both are flattened at load time:
//!
//! - flat: `{"tags": {"<id>": {...}}}` or `{"tags": [{...}]}`
//! - per-class: `{"<class>": [{"tag": "...", "tag_id": "...", ...}]}`

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::io::{JsonFileError, read_json};
use crate::report::{Check, Violation, child_pointer};

/// Which registry shape a document uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistryDocument<'a> {
    /// `{"tags": {...}}` or `{"tags": [...]}`.
    Flat(&'a Value),
    /// `{"<class>": [...], ...}`.
    PerClass(&'a Map<String, Value>),
}

impl<'a> RegistryDocument<'a> {
    /// Classify a registry document. Returns `None` when the root is not an
    /// object.
    #[must_use]
    pub fn detect(doc: &'a Value) -> Option<Self> {
        let root = doc.as_object()?;
        match root.get("tags") {
            Some(tags @ (Value::Object(_) | Value::Array(_))) => Some(Self::Flat(tags)),
            _ => Some(Self::PerClass(root)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStatus {
    Approved,
    Candidate,
    Other(String),
    Unset,
}

impl TagStatus {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Unset,
            Some("approved") => Self::Approved,
            Some("candidate") => Self::Candidate,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl fmt::Display for TagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("approved"),
            Self::Candidate => f.write_str("candidate"),
            Self::Other(s) => f.write_str(s),
            Self::Unset => f.write_str("(none)"),
        }
    }
}

/// One registry entry after flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// Canonical id (`tag`, else `id`, else `tag_id`, else the map key).
    pub id: String,
    /// Other spellings that resolve canonically (`tag_id`, `label`,
    /// `tag.<category>.<id>`).
    pub names: Vec<String>,
    pub class: String,
    pub status: TagStatus,
    pub allow_inferred: bool,
    pub aliases: Vec<String>,
    pub category: Option<String>,
    /// JSON pointer to the entry in the registry document.
    pub pointer: String,
}

/// How a tag string matched the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Canonical(&'a TagEntry),
    Alias(&'a TagEntry),
}

impl<'a> Resolution<'a> {
    #[must_use]
    pub const fn entry(self) -> &'a TagEntry {
        match self {
            Self::Canonical(e) | Self::Alias(e) => e,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRegistry {
    entries: Vec<TagEntry>,
    canonical: BTreeMap<String, usize>,
    aliases: BTreeMap<String, usize>,
    /// Shape problems found while flattening: `(pointer, message)`.
    issues: Vec<(String, String)>,
}

impl TagRegistry {
    /// # Errors
    ///
    /// Returns [`JsonFileError`] if the file is unreadable or not JSON.
    pub fn load(path: &Path) -> Result<Self, JsonFileError> {
        let registry = Self::parse(&read_json(path)?);
        debug!(path = %path.display(), entries = registry.entries.len(), "loaded tag registry");
        Ok(registry)
    }

    #[must_use]
    pub fn parse(doc: &Value) -> Self {
        let mut registry = Self::default();
        match RegistryDocument::detect(doc) {
            None => registry
                .issues
                .push((String::new(), "registry must be a JSON object".into())),
            Some(RegistryDocument::Flat(tags)) => registry.flatten_flat(tags),
            Some(RegistryDocument::PerClass(root)) => registry.flatten_per_class(root),
        }
        registry.index();
        registry
    }

    fn flatten_flat(&mut self, tags: &Value) {
        match tags {
            Value::Object(map) => {
                for (key, entry) in map {
                    let pointer = child_pointer("/tags", key);
                    self.push_entry(entry, "tags", Some(key), pointer);
                }
            }
            Value::Array(list) => {
                for (i, entry) in list.iter().enumerate() {
                    let pointer = child_pointer("/tags", i);
                    self.push_entry(entry, "tags", None, pointer);
                }
            }
            _ => {}
        }
    }

    fn flatten_per_class(&mut self, root: &Map<String, Value>) {
        for (class, value) in root {
            let class_pointer = child_pointer("", class);
            match value {
                Value::Array(list) => {
                    for (i, entry) in list.iter().enumerate() {
                        let pointer = child_pointer(&class_pointer, i);
                        self.push_entry(entry, class, None, pointer);
                    }
                }
                Value::Object(_) => self.issues.push((
                    class_pointer,
                    "expected an array of tag definitions".into(),
                )),
                // Scalars at the root are document metadata (`version`, `$schema`).
                _ => {}
            }
        }
    }

    fn push_entry(&mut self, entry: &Value, class: &str, key: Option<&str>, pointer: String) {
        let Some(obj) = entry.as_object() else {
            self.issues.push((pointer, "entry must be an object".into()));
            return;
        };
        let field = |name: &str| obj.get(name).and_then(Value::as_str).filter(|s| !s.is_empty());

        let Some(id) = field("tag").or_else(|| field("id")).or_else(|| field("tag_id")).or(key)
        else {
            self.issues.push((pointer, "missing 'tag' string".into()));
            return;
        };

        let aliases = match obj.get("aliases") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(list)) => {
                let mut out = Vec::new();
                for (i, alias) in list.iter().enumerate() {
                    match alias.as_str() {
                        Some(a) => out.push(a.to_string()),
                        None => self.issues.push((
                            child_pointer(&child_pointer(&pointer, "aliases"), i),
                            "alias entries must be strings".into(),
                        )),
                    }
                }
                out
            }
            Some(_) => {
                self.issues.push((
                    child_pointer(&pointer, "aliases"),
                    "aliases must be a list when provided".into(),
                ));
                Vec::new()
            }
        };

        let category = field("category").map(str::to_string);
        let mut names: Vec<String> = ["id", "tag_id", "label"]
            .into_iter()
            .filter_map(field)
            .filter(|n| *n != id)
            .map(str::to_string)
            .collect();
        if let Some(key) = key.filter(|k| *k != id) {
            names.push(key.to_string());
        }
        if let Some(cat) = &category
            && !id.starts_with("tag.")
        {
            names.push(format!("tag.{cat}.{id}"));
        }

        self.entries.push(TagEntry {
            id: id.to_string(),
            names,
            class: field("class").unwrap_or(class).to_string(),
            status: TagStatus::parse(field("status")),
            allow_inferred: obj.get("allow_inferred").and_then(Value::as_bool).unwrap_or(false),
            aliases,
            category,
            pointer,
        });
    }

    /// Lookup tables: primary ids win over secondary names, first entry wins
    /// over later duplicates.
    fn index(&mut self) {
        for (i, entry) in self.entries.iter().enumerate() {
            self.canonical.entry(entry.id.clone()).or_insert(i);
        }
        for (i, entry) in self.entries.iter().enumerate() {
            for name in &entry.names {
                self.canonical.entry(name.clone()).or_insert(i);
            }
        }
        for (i, entry) in self.entries.iter().enumerate() {
            for alias in &entry.aliases {
                self.aliases.entry(alias.clone()).or_insert(i);
            }
        }
    }

    /// Resolve a tag string: canonical names, then aliases, then the same
    /// with a leading `tag.` namespace stripped.
    #[must_use]
    pub fn resolve(&self, tag: &str) -> Option<Resolution<'_>> {
        self.resolve_exact(tag)
            .or_else(|| tag.strip_prefix("tag.").and_then(|t| self.resolve_exact(t)))
    }

    fn resolve_exact(&self, tag: &str) -> Option<Resolution<'_>> {
        if let Some(&i) = self.canonical.get(tag) {
            return Some(Resolution::Canonical(&self.entries[i]));
        }
        self.aliases
            .get(tag)
            .map(|&i| Resolution::Alias(&self.entries[i]))
    }

    #[must_use]
    pub fn entries(&self) -> &[TagEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry integrity findings for the registry at `file`.
///
/// Errors: shape problems, duplicate canonical ids, an alias naming another
/// entry's canonical id, an alias already owned by another entry, an empty
/// registry. Warnings: an alias equal to its own id, `allow_inferred` on a
/// tag that is not approved.
#[must_use]
pub fn check_registry(registry: &TagRegistry, file: &str) -> Vec<Violation> {
    let mut out: Vec<Violation> = registry
        .issues
        .iter()
        .map(|(pointer, msg)| Violation::error(Check::Registry, file, pointer.as_str(), msg.as_str()))
        .collect();

    let mut owners: BTreeMap<&str, &TagEntry> = BTreeMap::new();
    for entry in &registry.entries {
        if let Some(prev) = owners.get(entry.id.as_str()) {
            out.push(Violation::error(
                Check::Registry,
                file,
                entry.pointer.as_str(),
                format!(
                    "duplicate tag id '{}' also defined at {}",
                    entry.id, prev.pointer
                ),
            ));
        } else {
            owners.insert(&entry.id, entry);
        }
        if entry.allow_inferred && !entry.status.is_approved() {
            out.push(Violation::warning(
                Check::Registry,
                file,
                entry.pointer.as_str(),
                format!("allow_inferred=true on non-approved tag '{}'", entry.id),
            ));
        }
    }

    let mut alias_owner: BTreeMap<&str, &str> = BTreeMap::new();
    for entry in &registry.entries {
        for alias in &entry.aliases {
            if *alias == entry.id {
                out.push(Violation::warning(
                    Check::Registry,
                    file,
                    entry.pointer.as_str(),
                    format!("alias '{alias}' duplicates the canonical tag id"),
                ));
                continue;
            }
            if let Some(other) = owners.get(alias.as_str()) {
                out.push(Violation::error(
                    Check::Registry,
                    file,
                    entry.pointer.as_str(),
                    format!(
                        "alias '{alias}' collides with canonical tag defined at {}",
                        other.pointer
                    ),
                ));
                continue;
            }
            match alias_owner.get(alias.as_str()) {
                Some(owner) if *owner != entry.id => out.push(Violation::error(
                    Check::Registry,
                    file,
                    entry.pointer.as_str(),
                    format!("alias '{alias}' already assigned to tag '{owner}'"),
                )),
                Some(_) => {}
                None => {
                    alias_owner.insert(alias, &entry.id);
                }
            }
        }
    }

    if registry.entries.is_empty() {
        out.push(Violation::error(
            Check::Registry,
            file,
            "",
            "registry does not contain any tag entries",
        ));
    }

    out
}
