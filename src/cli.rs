use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Update Orchestrator - guided service update across a host fleet
#[derive(Parser)]
#[command(name = "update-orchestrator")]
#[command(about = "Stop, back up, update, distribute and restart a Windows service fleet")]
#[command(version)]
pub struct Cli {
    /// Enable debug diagnostics (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the update workflow
    Run {
        /// Path to the settings file
        #[arg(short, long)]
        config: PathBuf,

        /// Run against an in-memory simulation instead of real hosts.
        ///
        /// Service control goes to a simulated fleet; file copies still
        /// happen, so point the settings at scratch directories.
        #[arg(long)]
        dry_run: bool,

        /// Account used for remote actions (falls back to UPDATE_ORCH_USER)
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Load and validate a settings file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the ordered step list without executing anything
    Plan {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Summarize an existing run log
    Summarize {
        #[arg(short, long)]
        log: PathBuf,
    },
    /// Print a derived backup path
    BackupPath {
        #[arg(long)]
        root: String,
        #[arg(long, default_value = crate::paths::DEFAULT_BACKUP_PREFIX)]
        prefix: String,
        /// Month abbreviation, e.g. Jun
        #[arg(long)]
        month: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        sub_area: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_run_command() {
        let cli = Cli::try_parse_from([
            "update-orchestrator",
            "run",
            "--config",
            "settings.json",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                config,
                dry_run,
                username,
            } => {
                assert_eq!(config, PathBuf::from("settings.json"));
                assert!(dry_run);
                assert!(username.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_verbose_after_subcommand() {
        let cli =
            Cli::try_parse_from(["update-orchestrator", "summarize", "--log", "x.log", "-v"])
                .unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_backup_path_default_prefix() {
        let cli = Cli::try_parse_from([
            "update-orchestrator",
            "backup-path",
            "--root",
            "D:\\Backup",
            "--month",
            "Jun",
            "--year",
            "2024",
            "--sub-area",
            "TaxData",
        ])
        .unwrap();
        match cli.command {
            Commands::BackupPath { prefix, .. } => assert_eq!(prefix, "TaxFileupdate"),
            _ => panic!("expected backup-path"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["update-orchestrator"]).is_err());
    }
}
