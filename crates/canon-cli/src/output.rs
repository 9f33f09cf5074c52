//! Shared output layer: pretty output for humans, compact text for pipes and
//! agents, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. `output` in the user config
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.
//!
//! Resolution itself lives in `canon_core::config::resolve_config`; this
//! module only maps the resolved name and renders.

use canon_core::report::{Severity, Violation};
use serde::Serialize;
use std::io::{self, Write};

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-optimized output with markers and a summary line.
    Pretty,
    /// One plain line per finding.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Map the name produced by config resolution. Unknown names fall back
    /// to text.
    pub fn from_resolved(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Text,
        }
    }
}

/// Write `value` as pretty JSON followed by a newline.
pub fn write_json<T: Serialize>(w: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)?;
    Ok(())
}

/// Render a serializable value with explicit text/pretty renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => write_json(&mut out, value)?,
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

/// Line prefix for a finding in the given human mode.
pub const fn marker(mode: OutputMode, severity: Severity) -> &'static str {
    match (mode, severity) {
        (OutputMode::Pretty, Severity::Error) => "❌",
        (OutputMode::Pretty, Severity::Warning) => "⚠️ ",
        (_, Severity::Error) => "FAIL",
        (_, Severity::Warning) => "WARN",
    }
}

/// Write one line per violation, prefixed by its [`marker`].
pub fn write_violations<'a>(
    w: &mut dyn Write,
    mode: OutputMode,
    violations: impl IntoIterator<Item = &'a Violation>,
) -> io::Result<()> {
    for v in violations {
        writeln!(w, "{} {v}", marker(mode, v.severity))?;
    }
    Ok(())
}

/// Closing line of a human-mode findings listing.
pub fn write_summary(
    w: &mut dyn Write,
    mode: OutputMode,
    label: &str,
    errors: usize,
    warnings: usize,
) -> io::Result<()> {
    match mode {
        OutputMode::Pretty if errors == 0 && warnings == 0 => writeln!(w, "✓ {label}: clean"),
        OutputMode::Pretty => writeln!(w, "{label}: {errors} error(s), {warnings} warning(s)"),
        _ => writeln!(w, "{label}: errors={errors} warnings={warnings}"),
    }
}
