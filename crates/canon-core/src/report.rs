//! Accumulated validation findings.
//!
//! Validators never abort on a referential problem: each finding becomes a
//! [`Violation`] pushed onto a [`Report`], and the boundary (the CLI) decides
//! how to render it and which exit status to return.
//!
//! Pointers are RFC 6901 JSON pointers into the offending document. The
//! empty pointer (document root) renders as `<root>`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// How bad a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the run.
    Error,
    /// Advisory; fails the run only in strict mode.
    Warning,
}

/// The independent passes of the consistency validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Check {
    /// JSON-Schema conformance of canonical files.
    Schema,
    /// Timeline event identifier format and uniqueness.
    Ids,
    /// Skill references against the skills catalog.
    Skills,
    /// Tag registry integrity.
    Registry,
    /// Tag usage across all record files.
    Tags,
    /// Citation shape, placement and scene-range containment.
    Provenance,
}

impl Check {
    /// All checks in the order `validate_all` runs them.
    pub const ALL: [Self; 6] = [
        Self::Schema,
        Self::Ids,
        Self::Skills,
        Self::Registry,
        Self::Tags,
        Self::Provenance,
    ];

    /// Stable lowercase name used on the command line and in JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Ids => "ids",
            Self::Skills => "skills",
            Self::Registry => "registry",
            Self::Tags => "tags",
            Self::Provenance => "provenance",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown check name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown check '{raw}': expected one of schema, ids, skills, registry, tags, provenance")]
pub struct UnknownCheck {
    /// The unrecognised input string.
    pub raw: String,
}

impl FromStr for Check {
    type Err = UnknownCheck;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|check| check.as_str() == s)
            .ok_or_else(|| UnknownCheck { raw: s.to_string() })
    }
}

/// One finding, located by file and JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub severity: Severity,
    pub check: Check,
    /// Path of the offending file, relative to the repository root when possible.
    pub file: String,
    /// RFC 6901 pointer into the document (empty for the root).
    pub pointer: String,
    pub message: String,
}

impl Violation {
    #[must_use]
    pub fn error(
        check: Check,
        file: impl Into<String>,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, check, file, pointer, message)
    }

    #[must_use]
    pub fn warning(
        check: Check,
        file: impl Into<String>,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, check, file, pointer, message)
    }

    #[must_use]
    pub fn new(
        severity: Severity,
        check: Check,
        file: impl Into<String>,
        pointer: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            check,
            file: file.into(),
            pointer: pointer.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for [`Severity::Error`] findings.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The pointer as displayed to humans (`<root>` for the empty pointer).
    #[must_use]
    pub fn display_pointer(&self) -> &str {
        if self.pointer.is_empty() {
            "<root>"
        } else {
            &self.pointer
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} → {}",
            self.file,
            self.display_pointer(),
            self.message
        )
    }
}

/// Every finding from one validation run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub violations: Vec<Violation>,
}

impl Report {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_error())
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Findings produced by a single check.
    pub fn for_check(&self, check: Check) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.check == check)
    }

    /// Returns `true` when the run passes. Warnings only fail a strict run.
    #[must_use]
    pub fn is_ok(&self, strict: bool) -> bool {
        self.error_count() == 0 && (!strict || self.warning_count() == 0)
    }
}

/// Append one reference token to a JSON pointer, escaping `~` and `/`.
#[must_use]
pub fn child_pointer(parent: &str, token: impl fmt::Display) -> String {
    let token = token.to_string().replace('~', "~0").replace('/', "~1");
    format!("{parent}/{token}")
}
