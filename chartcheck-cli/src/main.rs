use std::process::ExitCode;

use clap::Parser;

use chartcheck_core::HarnessConfig;
use chartcheck_core::config::GeneralConfig;

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "chartcheck failed");
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

/// File, then `CHARTCHECK_*` environment, then command-line flags.
async fn load_config(cli: &Cli) -> Result<HarnessConfig, CliError> {
    let mut config = HarnessConfig::load_or_default(&cli.config).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let config = load_config(&cli).await;

    let mut general = config
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_else(|_| GeneralConfig::default());
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general).map_err(|e| CliError::Command(e.to_string()))?;

    tracing::info!(config = %cli.config.display(), "chartcheck starting");

    match cli.command {
        Commands::Deploy(args) => commands::deploy::execute(args, config?, &writer).await,
        Commands::Ui(args) => commands::ui::execute(args, config?, &writer).await,
        Commands::Status(args) => commands::status::execute(args, config?, &writer).await,
        Commands::Drive(args) => commands::drive::execute(args, config?, &writer).await,
        Commands::Config(args) => {
            commands::config::execute(args, &cli.config, config, &writer).await
        }
    }
}
