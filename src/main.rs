//! pgmon - PostgreSQL monitoring and review agent
//!
//! Collects server configuration, logs, SQL files and host metrics and sends
//! them to a review API, or serves database metrics for Prometheus.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use pgmon::{app::App, cli::Cli, config::Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        std::process::exit(2);
    };

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("pgmon starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Environment: {}", config.environment);
    info!("Log Path: {}", config.log_path.display());
    info!("Vault Address: {}", config.vault.address);
    info!("Vault Mount: {}", config.vault.mount);
    info!("Review API URL: {}", config.review_api.url);
    info!("Review API Timeout: {}s", config.review_api.timeout_secs);
    info!("Server Log Directory: {}", config.logs.directory);
    info!("Log Window: {}s", config.logs.window_secs);
    info!("-------------------------------------------------------");

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run(command).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
