use anyhow::{Context as _, Result};
use canon_core::config::EffectiveConfig;
use canon_core::projection::compare::{DEFAULT_FIELD_SUFFIXES, compare};
use clap::Args;
use tracing::debug;

use crate::output::write_json;

/// Arguments for `canon compare`.
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Character id (`ch.jake` or `jake`).
    #[arg(long)]
    pub character: String,

    /// Node id prefix of the skill family, e.g. `sn.meditation`.
    #[arg(long)]
    pub topic: String,

    /// Field-path suffix that counts as evidence (repeatable). Defaults to
    /// `recovery` and `regen`.
    #[arg(long = "field-suffix", value_name = "SUFFIX")]
    pub field_suffixes: Vec<String>,
}

/// Print the before/after verdict as pretty JSON.
///
/// # Errors
///
/// Returns an error if the timeline cannot be loaded.
pub fn run_compare(args: &CompareArgs, config: &EffectiveConfig) -> Result<()> {
    let suffixes: Vec<String> = if args.field_suffixes.is_empty() {
        DEFAULT_FIELD_SUFFIXES.iter().map(ToString::to_string).collect()
    } else {
        args.field_suffixes.clone()
    };
    let verdict = compare(&config.layout, &args.character, &args.topic, &suffixes)
        .with_context(|| format!("compare '{}' for '{}'", args.topic, args.character))?;
    debug!(verdict = verdict.name(), "compare finished");
    write_json(&mut std::io::stdout().lock(), &verdict)
}
