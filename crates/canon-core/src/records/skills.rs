//! Skills catalog: display name -> skill record.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::io::{JsonFileError, read_json};

/// Drop a trailing ` (Rarity)` parenthetical: `"Meditation (Common)"` ->
/// `"Meditation"`.
#[must_use]
pub fn strip_rarity(name: &str) -> &str {
    name.split_once(" (").map_or(name, |(base, _)| base).trim()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillCatalog {
    records: BTreeMap<String, Value>,
    by_base_name: BTreeMap<String, String>,
}

impl SkillCatalog {
    /// Build from a `{name: record}` object. Anything else is an empty
    /// catalog (schema validation reports the shape problem).
    #[must_use]
    pub fn from_value(doc: &Value) -> Self {
        let mut catalog = Self::default();
        if let Some(map) = doc.as_object() {
            for (name, record) in map {
                catalog
                    .by_base_name
                    .entry(strip_rarity(name).to_string())
                    .or_insert_with(|| name.clone());
                catalog.records.insert(name.clone(), record.clone());
            }
        }
        catalog
    }

    /// # Errors
    ///
    /// Returns [`JsonFileError`] if the catalog cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, JsonFileError> {
        read_json(path).map(|doc| Self::from_value(&doc))
    }

    /// Resolve a skill reference to its catalog name: exact match first, then
    /// by name without the rarity suffix.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.records.get_key_value(name) {
            return Some(key);
        }
        self.by_base_name.get(strip_rarity(name)).map(String::as_str)
    }

    /// The catalog record for `name` (exact or rarity-stripped match).
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&Value> {
        self.resolve(name).and_then(|key| self.records.get(key))
    }
}
