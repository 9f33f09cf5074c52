use anyhow::Result;
use canon_core::config::EffectiveConfig;
use canon_core::maintenance::sort_timeline;
use clap::Args;
use serde_json::json;

use crate::output::{OutputMode, render_mode};

/// Arguments for `canon sort-timeline`.
#[derive(Args, Debug)]
pub struct SortArgs {
    /// Character whose timeline is re-sorted.
    #[arg(long)]
    pub character: String,
}

/// Re-sort a timeline file on disk by scene, day, order and event id.
///
/// # Errors
///
/// Returns an error if the timeline cannot be read or rewritten.
pub fn run_sort(args: &SortArgs, config: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let layout = &config.layout;
    let path = layout.display(&layout.timeline_path(&args.character));
    let changed = sort_timeline(layout, &args.character)?;
    let status = if changed { "sorted" } else { "unchanged" };
    render_mode(
        output,
        &json!({"timeline": path, "changed": changed}),
        |_, w| writeln!(w, "{status} {path}"),
        |_, w| {
            if changed {
                writeln!(w, "✓ re-sorted {path}")
            } else {
                writeln!(w, "✓ {path} already sorted")
            }
        },
    )
}
