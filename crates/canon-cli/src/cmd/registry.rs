use std::io::{self, Write};

use anyhow::{Context as _, Result};
use canon_core::config::EffectiveConfig;
use canon_core::records::{TagRegistry, check_registry};
use canon_core::report::Violation;
use clap::Args;
use serde::Serialize;

use crate::output::{OutputMode, render_mode, write_summary, write_violations};

/// Arguments for `canon check-registry`.
#[derive(Args, Debug)]
pub struct RegistryArgs {
    /// Exit non-zero on warnings too.
    #[arg(long)]
    pub fail_on_warning: bool,
}

#[derive(Serialize)]
struct RegistryOutput {
    registry: String,
    ok: bool,
    violations: Vec<Violation>,
}

fn write_human(r: &RegistryOutput, w: &mut dyn Write, mode: OutputMode) -> io::Result<()> {
    write_violations(w, mode, &r.violations)?;
    let errors = r.violations.iter().filter(|v| v.is_error()).count();
    write_summary(w, mode, &r.registry, errors, r.violations.len() - errors)
}

/// Check the tag registry's internal integrity.
///
/// # Errors
///
/// Returns an error if the registry cannot be read, or `check-registry:
/// failed` on errors (or warnings with `--fail-on-warning`).
pub fn run_check_registry(
    args: &RegistryArgs,
    config: &EffectiveConfig,
    output: OutputMode,
) -> Result<()> {
    let layout = &config.layout;
    let registry = TagRegistry::load(&layout.tag_registry)
        .with_context(|| format!("cannot load tag registry {}", layout.display(&layout.tag_registry)))?;
    let file = layout.display(&layout.tag_registry);
    let violations = check_registry(&registry, &file);

    let failing = violations
        .iter()
        .any(|v| v.is_error() || args.fail_on_warning);
    let result = RegistryOutput {
        registry: file,
        ok: !failing,
        violations,
    };
    render_mode(
        output,
        &result,
        |r, w| write_human(r, w, OutputMode::Text),
        |r, w| write_human(r, w, OutputMode::Pretty),
    )?;

    if failing {
        anyhow::bail!("check-registry: failed");
    }
    Ok(())
}
