mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use discarr_config::{ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use discarr_model::ServiceKind;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, ConfigCommand, GlobalArgs, RunArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let ConfigLoad { config, warnings } = load_config(&cli.global)?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(
                    message = %warning.message,
                    hint = %hint,
                    "configuration warning"
                )
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    let outcome = match cli.command.unwrap_or(Command::Run(RunArgs::default()))
    {
        Command::Run(args) => {
            let requested: Vec<ServiceKind> =
                args.services.into_iter().map(ServiceKind::from).collect();
            commands::run_services(&config, &requested).await?
        }
        Command::Metadata => commands::run_metadata_sweep(&config).await?,
        Command::Ledger { target } => {
            commands::print_ledger(&config, target);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Config(ConfigCommand::Check) => {
            commands::print_config_summary(&config);
            println!("configuration OK ({} warnings)", warnings.items.len());
            return Ok(ExitCode::SUCCESS);
        }
    };

    if outcome.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(aborted = ?outcome.aborted, "some runs did not complete");
        Ok(ExitCode::FAILURE)
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &GlobalArgs) -> anyhow::Result<ConfigLoad> {
    ConfigLoader::with_options(ConfigLoaderOptions {
        config_path: args.config.clone(),
        env_file: args.env_file.clone(),
        state_dir: args.state_dir.clone(),
    })
    .load()
    .context("failed to load configuration")
}
