use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use discarr_model::ServiceKind;

#[derive(Parser, Debug)]
#[command(name = "discarr", version)]
#[command(
    about = "Discard Radarr/Sonarr downloads stalled past their catch-up window"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to discarr.toml (must exist when given)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Directory holding the ledger files (overrides config)
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sweep *arr queues for stalled downloads (default command)
    Run(RunArgs),
    /// Sweep Transmission for torrents stuck fetching metadata
    Metadata,
    /// Print a ledger without contacting any service
    Ledger {
        #[arg(value_enum)]
        target: LedgerTarget,
    },
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RunArgs {
    /// Restrict the sweep to these services (repeatable)
    #[arg(long = "service", value_enum)]
    pub services: Vec<ServiceArg>,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Load and validate configuration, printing any warnings
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceArg {
    Radarr,
    Sonarr,
}

impl From<ServiceArg> for ServiceKind {
    fn from(value: ServiceArg) -> Self {
        match value {
            ServiceArg::Radarr => ServiceKind::Radarr,
            ServiceArg::Sonarr => ServiceKind::Sonarr,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LedgerTarget {
    Radarr,
    Sonarr,
    Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repeated_service_flags_accumulate() {
        let cli = Cli::parse_from([
            "discarr",
            "run",
            "--service",
            "radarr",
            "--service",
            "sonarr",
        ]);
        match cli.command {
            Some(Command::Run(args)) => assert_eq!(
                args.services,
                vec![ServiceArg::Radarr, ServiceArg::Sonarr]
            ),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli =
            Cli::parse_from(["discarr", "ledger", "metadata", "--verbose"]);
        assert!(cli.global.verbose);
        assert!(matches!(
            cli.command,
            Some(Command::Ledger {
                target: LedgerTarget::Metadata
            })
        ));
    }
}
