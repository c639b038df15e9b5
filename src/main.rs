//! Neurohost CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use neurohost::cli::{commands, Cli, Commands};
use neurohost::infrastructure::config::ConfigLoader;
use neurohost::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        neurohost::cli::handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let log_config = LogConfig::try_from(&config.logging)?;
    let _logger = LoggerImpl::init(&log_config).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, &config, cli.json).await,
        Commands::Watch(args) => commands::watch::execute(args, &config, cli.json).await,
        Commands::Chat(args) => commands::chat::execute(args, &config, cli.json).await,
        Commands::Config => commands::config::execute(&config, cli.json),
    }
}
