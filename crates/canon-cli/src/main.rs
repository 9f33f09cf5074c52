#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "canon: timeline projector and consistency checks for records datasets",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Repository root (defaults to the current directory).
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Projection",
        about = "Print what a character knows at a scene",
        long_about = "Replay a character timeline up to a cutoff scene and print the projection state as JSON.",
        after_help = "EXAMPLES:\n    # Character view (default)\n    canon snapshot --character ch.jake --scene 01.02.01\n\n    # Book order\n    canon snapshot --character jake --scene 01.02.01 --view reader"
    )]
    Snapshot(cmd::snapshot::SnapshotArgs),

    #[command(
        next_help_heading = "Projection",
        about = "Compare evidence before and after a skill upgrade",
        long_about = "Report whether a skill family's mechanic was confirmed before or after its first evolve/upgrade event.",
        after_help = "EXAMPLES:\n    # Default field suffixes (recovery, regen)\n    canon compare --character jake --topic sn.meditation\n\n    # Custom suffix\n    canon compare --character jake --topic sn.healing --field-suffix cooldown"
    )]
    Compare(cmd::compare::CompareArgs),

    #[command(
        next_help_heading = "Validation",
        about = "Run every cross-file consistency check",
        long_about = "Validate schemas, event ids, skill references, the tag registry, tag usage and citations in one pass.",
        after_help = "EXAMPLES:\n    # Full pass\n    canon validate\n\n    # Fail on warnings, reject candidate tags\n    canon validate --strict --tag-mode export\n\n    # Only tags and provenance\n    canon validate --only tags --only provenance --json"
    )]
    Validate(cmd::validate::ValidateArgs),

    #[command(
        next_help_heading = "Validation",
        about = "Check tag registry integrity",
        after_help = "EXAMPLES:\n    canon check-registry --fail-on-warning"
    )]
    CheckRegistry(cmd::registry::RegistryArgs),

    #[command(
        next_help_heading = "Validation",
        about = "Find legacy hyphenated scene ids",
        after_help = "EXAMPLES:\n    # Whole records tree\n    canon check-scene-ids\n\n    # Specific files\n    canon check-scene-ids records/characters/jake/timeline.json"
    )]
    CheckSceneIds(cmd::scene_ids::CheckSceneIdsArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Rewrite legacy scene ids to BB.CC.SS",
        after_help = "EXAMPLES:\n    canon migrate-scene-ids --dry-run"
    )]
    MigrateSceneIds(cmd::migrate::MigrateArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Re-sort a timeline file on disk",
        after_help = "EXAMPLES:\n    canon sort-timeline --character jake"
    )]
    SortTimeline(cmd::sort::SortArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    canon completions bash"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CANON_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "canon=debug,info"
        } else {
            "canon=info,warn"
        })
    });

    let format = env::var("CANON_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };

    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let config = canon_core::config::resolve_config(&project_root, cli.json)?;
    let output = OutputMode::from_resolved(&config.resolved_output);
    debug!(root = %project_root.display(), ?output, "resolved config");

    match &cli.command {
        Commands::Snapshot(args) => cmd::snapshot::run_snapshot(args, &config),
        Commands::Compare(args) => cmd::compare::run_compare(args, &config),
        Commands::Validate(args) => cmd::validate::run_validate(args, &config, output, cli.quiet),
        Commands::CheckRegistry(args) => {
            cmd::registry::run_check_registry(args, &config, output)
        }
        Commands::CheckSceneIds(args) => {
            cmd::scene_ids::run_check_scene_ids(args, &config, output)
        }
        Commands::MigrateSceneIds(args) => cmd::migrate::run_migrate(args, &config, output),
        Commands::SortTimeline(args) => cmd::sort::run_sort(args, &config, output),
        Commands::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_core::projection::View;
    use canon_core::report::Check;
    use canon_core::verify::TagMode;

    #[test]
    fn json_flag_parses_before_and_after_subcommand() {
        let cli = Cli::parse_from(["canon", "--json", "validate"]);
        assert!(cli.json);
        let cli = Cli::parse_from(["canon", "validate", "--json"]);
        assert!(cli.json);
    }

    #[test]
    fn root_flag_is_global() {
        let cli = Cli::parse_from(["canon", "check-registry", "--root", "/data/canon"]);
        assert_eq!(cli.root, Some(PathBuf::from("/data/canon")));
    }

    #[test]
    fn quiet_flag_parsed() {
        let cli = Cli::parse_from(["canon", "-q", "validate"]);
        assert!(cli.quiet);
    }

    #[test]
    fn snapshot_parses_view() {
        let cli = Cli::parse_from([
            "canon",
            "snapshot",
            "--character",
            "ch.jake",
            "--scene",
            "01-02-01",
            "--view",
            "reader",
        ]);
        let Commands::Snapshot(args) = cli.command else {
            panic!("expected snapshot");
        };
        assert_eq!(args.character, "ch.jake");
        assert_eq!(args.scene, "01-02-01");
        assert_eq!(args.view, Some(View::Reader));
    }

    #[test]
    fn snapshot_rejects_unknown_view() {
        let result = Cli::try_parse_from([
            "canon",
            "snapshot",
            "--character",
            "jake",
            "--scene",
            "01.01.01",
            "--view",
            "omniscient",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn validate_collects_repeated_only() {
        let cli = Cli::parse_from([
            "canon",
            "validate",
            "--strict",
            "--tag-mode",
            "export",
            "--only",
            "tags",
            "--only",
            "provenance",
        ]);
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert!(args.strict);
        assert_eq!(args.tag_mode, Some(TagMode::Export));
        assert_eq!(args.only, vec![Check::Tags, Check::Provenance]);
    }

    #[test]
    fn compare_collects_field_suffixes() {
        let cli = Cli::parse_from([
            "canon",
            "compare",
            "--character",
            "jake",
            "--topic",
            "sn.meditation",
            "--field-suffix",
            "cooldown",
            "--field-suffix",
            "regen",
        ]);
        let Commands::Compare(args) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(args.field_suffixes, ["cooldown", "regen"]);
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["canon", "snapshot", "--character", "j", "--scene", "01.01.01"],
            vec!["canon", "compare", "--character", "j", "--topic", "sn.x"],
            vec!["canon", "validate"],
            vec!["canon", "check-registry"],
            vec!["canon", "check-scene-ids", "a.json", "b.json"],
            vec!["canon", "migrate-scene-ids", "--dry-run"],
            vec!["canon", "sort-timeline", "--character", "j"],
            vec!["canon", "completions", "bash"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn bash_completions_cover_subcommands() {
        let mut buf = Vec::new();
        cmd::completions::write_completions(
            clap_complete::Shell::Bash,
            &mut Cli::command(),
            &mut buf,
        );
        let script = String::from_utf8(buf).expect("utf8");
        assert!(script.contains("_canon()"));
        assert!(script.contains("check-scene-ids"));
        assert!(script.contains("--tag-mode"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
