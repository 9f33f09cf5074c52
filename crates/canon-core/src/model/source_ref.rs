//! Citations pointing a claim back at the text that supports it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

/// Where a citation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A line range inside a registered scene.
    #[default]
    Scene,
    Wiki,
    User,
    Inferred,
    External,
}

impl SourceKind {
    pub const ALL: [Self; 5] = [
        Self::Scene,
        Self::Wiki,
        Self::User,
        Self::Inferred,
        Self::External,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::Wiki => "wiki",
            Self::User => "user",
            Self::Inferred => "inferred",
            Self::External => "external",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown citation type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid source_ref.type '{raw}': expected one of scene, wiki, user, inferred, external")]
pub struct UnknownSourceKind {
    pub raw: String,
}

impl FromStr for SourceKind {
    type Err = UnknownSourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownSourceKind { raw: s.to_string() })
    }
}

/// One citation. Owned by the event that declares it.
///
/// For [`SourceKind::Scene`] citations the loader guarantees `scene_id` is
/// canonical and `1 <= line_start <= line_end`. Keys the model does not name
/// (`quote`, `inference`, ...) are kept in `extra` and serialised back out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_type: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SourceRef {
    /// A scene citation covering `line_start..=line_end`.
    #[must_use]
    pub fn scene(scene_id: impl Into<String>, line_start: u64, line_end: u64) -> Self {
        Self {
            kind: SourceKind::Scene,
            scene_id: Some(scene_id.into()),
            line_start: Some(line_start),
            line_end: Some(line_end),
            confidence: None,
            inference_note: None,
            inference_type: None,
            extra: BTreeMap::new(),
        }
    }

    /// Returns `true` if the citation flags itself as an inference.
    #[must_use]
    pub fn is_inferred(&self) -> bool {
        self.inference_type.is_some() || self.kind == SourceKind::Inferred
    }
}
