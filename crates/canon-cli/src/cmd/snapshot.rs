use anyhow::{Context as _, Result};
use canon_core::config::EffectiveConfig;
use canon_core::projection::{View, project};
use clap::Args;

use crate::output::write_json;

/// Arguments for `canon snapshot`.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Character id (`ch.jake` or `jake`).
    #[arg(long)]
    pub character: String,

    /// Cutoff scene, `BB.CC.SS` (legacy `BB-CC-SS` accepted).
    #[arg(long)]
    pub scene: String,

    /// Replay order. Defaults to `[projector] default_view`.
    #[arg(long)]
    pub view: Option<View>,
}

/// Print the projection state as pretty JSON.
///
/// # Errors
///
/// Returns an error if the configured default view is invalid or the
/// timeline cannot be projected.
pub fn run_snapshot(args: &SnapshotArgs, config: &EffectiveConfig) -> Result<()> {
    let view = match args.view {
        Some(view) => view,
        None => config
            .project
            .projector
            .default_view
            .parse()
            .map_err(|e| anyhow::anyhow!("projector.default_view: {e}"))?,
    };
    let state = project(&config.layout, &args.character, &args.scene, view).with_context(|| {
        format!(
            "snapshot of '{}' at {} ({view} view)",
            args.character, args.scene
        )
    })?;
    write_json(&mut std::io::stdout().lock(), &state)
}
