use std::io::{self, Write};

use anyhow::Result;
use clap::Args;
use clap_complete::{Shell, generate};

/// Name completions are registered under; matches the installed binary.
const BIN_NAME: &str = "canon";

/// Arguments for `canon completions`.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to emit the script for (bash, zsh, fish, elvish, powershell).
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `shell` into `w`. Subcommands such as
/// `check-scene-ids` and flags such as `--tag-mode` come from `command`.
pub fn write_completions(shell: Shell, command: &mut clap::Command, w: &mut dyn Write) {
    generate(shell, command, BIN_NAME, w);
}

/// Print the completion script for `canon` on stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be flushed.
pub fn run_completions(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_completions(shell, command, &mut out);
    out.flush()?;
    Ok(())
}
