//! Scene identifiers.
//!
//! A scene id addresses a `book.chapter.scene` position as three zero-padded
//! two-digit fields. Two spellings exist in the dataset:
//!
//! - `BB.CC.SS`: the current, canonical form.
//! - `BB-CC-SS`: the legacy form, accepted on input only.
//!
//! Parsing normalises both to the dotted form, so ordering and equality are
//! plain string comparisons. Because every field is fixed-width, lexicographic
//! order is book order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which spelling a scene id was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneIdFormat {
    /// `BB.CC.SS`
    Dotted,
    /// `BB-CC-SS` (legacy)
    Hyphenated,
}

/// Error returned for a string that is neither accepted scene id form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scene id must be BB.CC.SS (or legacy BB-CC-SS), got '{raw}'")]
pub struct SceneIdError {
    /// The rejected input.
    pub raw: String,
}

/// A canonical (dotted) scene id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SceneId(String);

impl SceneId {
    /// Parse either accepted form, normalising to `BB.CC.SS`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneIdError`] when `raw` matches neither form.
    pub fn parse(raw: &str) -> Result<Self, SceneIdError> {
        Self::parse_with_format(raw).map(|(id, _)| id)
    }

    /// Parse and also report which spelling the input used.
    ///
    /// # Errors
    ///
    /// Returns [`SceneIdError`] when `raw` matches neither form.
    pub fn parse_with_format(raw: &str) -> Result<(Self, SceneIdFormat), SceneIdError> {
        let bytes = raw.as_bytes();
        let err = || SceneIdError {
            raw: raw.to_string(),
        };

        if bytes.len() != 8 {
            return Err(err());
        }

        let format = match (bytes[2], bytes[5]) {
            (b'.', b'.') => SceneIdFormat::Dotted,
            (b'-', b'-') => SceneIdFormat::Hyphenated,
            _ => return Err(err()),
        };

        let digits_ok = [0, 1, 3, 4, 6, 7]
            .iter()
            .all(|&i| bytes[i].is_ascii_digit());
        if !digits_ok {
            return Err(err());
        }

        let canonical = format!("{}.{}.{}", &raw[0..2], &raw[3..5], &raw[6..8]);
        Ok((Self(canonical), format))
    }

    /// The canonical dotted spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The legacy hyphenated spelling of this id.
    #[must_use]
    pub fn to_hyphenated(&self) -> String {
        self.0.replace('.', "-")
    }
}

/// Returns `true` if `raw` is a scene id in the legacy `BB-CC-SS` form.
#[must_use]
pub fn is_legacy_scene_id(raw: &str) -> bool {
    matches!(
        SceneId::parse_with_format(raw),
        Ok((_, SceneIdFormat::Hyphenated))
    )
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SceneId {
    type Err = SceneIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SceneId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SceneId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
