use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use canon_core::config::EffectiveConfig;
use canon_core::maintenance::{default_lint_targets, lint_file};
use clap::Args;
use serde::Serialize;

use crate::output::{OutputMode, render_mode};

/// Arguments for `canon check-scene-ids`.
#[derive(Args, Debug)]
pub struct CheckSceneIdsArgs {
    /// Files to lint. Defaults to every JSON file under the records tree.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Finding {
    file: String,
    lines: Vec<usize>,
}

fn write_findings(findings: &[Finding], w: &mut dyn Write, mode: OutputMode) -> io::Result<()> {
    for f in findings {
        for line in &f.lines {
            match mode {
                OutputMode::Pretty => writeln!(
                    w,
                    "❌ {}:{line}: hyphenated scene id; use BB.CC.SS",
                    f.file
                )?,
                _ => writeln!(w, "{}:{line}", f.file)?,
            }
        }
    }
    if mode == OutputMode::Pretty && findings.is_empty() {
        writeln!(w, "✓ no hyphenated scene ids")?;
    }
    Ok(())
}

/// Lint files for legacy `BB-CC-SS` scene ids.
///
/// # Errors
///
/// Returns `check-scene-ids: failed` if any file contains one.
pub fn run_check_scene_ids(
    args: &CheckSceneIdsArgs,
    config: &EffectiveConfig,
    output: OutputMode,
) -> Result<()> {
    let layout = &config.layout;
    let targets = if args.files.is_empty() {
        default_lint_targets(layout)
    } else {
        args.files.clone()
    };

    let findings: Vec<Finding> = targets
        .iter()
        .filter_map(|path| {
            let lines = lint_file(path);
            (!lines.is_empty()).then(|| Finding {
                file: layout.display(path),
                lines,
            })
        })
        .collect();

    render_mode(
        output,
        &findings,
        |f, w| write_findings(f, w, OutputMode::Text),
        |f, w| write_findings(f, w, OutputMode::Pretty),
    )?;

    if findings.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("check-scene-ids: failed");
    }
}
