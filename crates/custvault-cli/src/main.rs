mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use custvault_config::Config;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = load_config(&cli).inspect_err(|e| error!("Invalid configuration: {:#}", e))?;
    let repository = commands::bootstrap(&config)
        .await
        .inspect_err(|e| error!("Startup failed: {:#}", e))?;

    match cli.command {
        cli::Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            commands::serve::handle(repository, host, port).await
        }
        cli::Commands::Records { limit, raw } => {
            commands::records::handle(&repository, limit, raw).await
        }
    }
}

fn load_config(cli: &cli::Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
