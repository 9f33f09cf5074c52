use std::io::{self, Write};

use anyhow::Result;
use canon_core::config::EffectiveConfig;
use canon_core::maintenance::{Migration, migrate_scene_ids};
use clap::Args;

use crate::output::{OutputMode, render_mode};

/// Arguments for `canon migrate-scene-ids`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Report what would change without writing.
    #[arg(long)]
    pub dry_run: bool,
}

fn write_migration(
    m: &Migration,
    w: &mut dyn Write,
    dry_run: bool,
    pretty: bool,
) -> io::Result<()> {
    let verb = if dry_run { "would rewrite" } else { "rewrote" };
    for file in &m.changed {
        writeln!(w, "{verb} {file}")?;
    }
    if pretty {
        writeln!(
            w,
            "✓ {} scene id(s) in {} file(s){}",
            m.rewritten,
            m.changed.len(),
            if dry_run { " (dry run)" } else { "" }
        )?;
    }
    Ok(())
}

/// Canonicalise every `scene_id` under the records tree.
///
/// # Errors
///
/// Returns an error if a record file cannot be parsed or rewritten.
pub fn run_migrate(args: &MigrateArgs, config: &EffectiveConfig, output: OutputMode) -> Result<()> {
    let migration = migrate_scene_ids(&config.layout, args.dry_run)?;
    render_mode(
        output,
        &migration,
        |m, w| write_migration(m, w, args.dry_run, false),
        |m, w| write_migration(m, w, args.dry_run, true),
    )
}
