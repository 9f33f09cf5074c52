//! Dotted-namespace identifiers: events (`ev.`), knowledge nodes (`sn.`), tags.

use std::fmt;

use serde::Serialize;

/// Returns `true` if `seg` is a non-empty run of `[a-z0-9_]`.
#[must_use]
pub fn is_id_segment(seg: &str) -> bool {
    !seg.is_empty()
        && seg
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn is_two_digits(seg: &str) -> bool {
    seg.len() == 2 && seg.bytes().all(|b| b.is_ascii_digit())
}

/// Loose event id check used when loading a timeline: the literal `ev.`
/// prefix followed by one or more lowercase dotted segments.
#[must_use]
pub fn is_event_id(raw: &str) -> bool {
    raw.strip_prefix("ev.")
        .is_some_and(|rest| rest.split('.').all(is_id_segment))
}

/// Canonical event id: `ev.<character>.<BB>.<CC>.<SS>.<slug>`.
#[must_use]
pub fn is_canonical_event_id(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('.').collect();
    parts.len() == 6
        && parts[0] == "ev"
        && is_id_segment(parts[1])
        && parts[2..5].iter().all(|p| is_two_digits(p))
        && is_id_segment(parts[5])
}

/// Lowercase snake_case: `[a-z0-9]+(_[a-z0-9]+)*`.
#[must_use]
pub fn is_snake_case(raw: &str) -> bool {
    !raw.is_empty()
        && raw.split('_').all(|word| {
            !word.is_empty()
                && word
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

/// Error returned for a malformed knowledge node id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("bad node id: '{raw}'")]
pub struct NodeIdError {
    pub raw: String,
}

/// A knowledge node id: `sn.<slug>[.<rank>...]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// # Errors
    ///
    /// Returns [`NodeIdError`] unless `raw` is `sn` followed by at least one
    /// `[a-z0-9_]+` segment.
    pub fn parse(raw: &str) -> Result<Self, NodeIdError> {
        let valid = raw
            .strip_prefix("sn.")
            .is_some_and(|rest| rest.split('.').all(is_id_segment));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(NodeIdError {
                raw: raw.to_string(),
            })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
