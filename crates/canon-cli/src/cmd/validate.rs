use std::io::{self, Write};

use anyhow::Result;
use canon_core::config::EffectiveConfig;
use canon_core::report::{Check, Violation};
use canon_core::verify::{InlinePolicy, TagMode, VerifyOptions, validate_all};
use clap::Args;
use serde::Serialize;

use crate::output::{OutputMode, render_mode, write_summary, write_violations};

/// Arguments for `canon validate`.
#[derive(Args, Debug, Default)]
pub struct ValidateArgs {
    /// Treat warnings as failures.
    #[arg(long)]
    pub strict: bool,

    /// Tag strictness: `draft` tolerates candidate tags, `export` rejects
    /// anything not approved.
    #[arg(long, value_name = "MODE")]
    pub tag_mode: Option<TagMode>,

    /// Severity of `source_ref` blocks inlined in canonical records.
    #[arg(long, value_name = "POLICY")]
    pub inline_source_ref: Option<InlinePolicy>,

    /// Run only this check (repeatable): schema, ids, skills, registry,
    /// tags, provenance.
    #[arg(long = "only", value_name = "CHECK")]
    pub only: Vec<Check>,
}

impl ValidateArgs {
    /// Apply flag overrides on top of config-derived options.
    fn apply(&self, mut options: VerifyOptions) -> VerifyOptions {
        options.strict |= self.strict;
        if let Some(mode) = self.tag_mode {
            options.tag_mode = mode;
        }
        if let Some(policy) = self.inline_source_ref {
            options.inline_source_ref = policy;
        }
        options.only.extend(self.only.iter().copied());
        options
    }
}

#[derive(Serialize)]
struct ValidateOutput<'a> {
    ok: bool,
    strict: bool,
    errors: usize,
    warnings: usize,
    violations: &'a [Violation],
}

fn write_human(
    r: &ValidateOutput<'_>,
    w: &mut dyn Write,
    mode: OutputMode,
    quiet: bool,
) -> io::Result<()> {
    write_violations(w, mode, r.violations)?;
    if quiet {
        return Ok(());
    }
    write_summary(w, mode, "validate", r.errors, r.warnings)
}

/// Run the full consistency pass and print every finding.
///
/// # Errors
///
/// Returns an error if the config is invalid, or `validate: failed` when
/// the report has errors (or warnings under `--strict`).
pub fn run_validate(
    args: &ValidateArgs,
    config: &EffectiveConfig,
    output: OutputMode,
    quiet: bool,
) -> Result<()> {
    let options = args.apply(VerifyOptions::from_config(&config.project)?);
    let report = validate_all(&config.layout, &options);
    let ok = report.is_ok(options.strict);

    let result = ValidateOutput {
        ok,
        strict: options.strict,
        errors: report.error_count(),
        warnings: report.warning_count(),
        violations: &report.violations,
    };
    render_mode(
        output,
        &result,
        |r, w| write_human(r, w, OutputMode::Text, quiet),
        |r, w| write_human(r, w, OutputMode::Pretty, quiet),
    )?;

    if ok {
        Ok(())
    } else {
        anyhow::bail!("validate: failed");
    }
}
