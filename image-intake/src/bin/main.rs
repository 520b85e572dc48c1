//! image-intake server binary

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image_intake::{config::IntakeConfig, handlers, observability, state::AppState};
use std::path::PathBuf;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "image-intake")]
#[command(version)]
#[command(about = "Validating image upload server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the upload server
    Serve {
        /// Explicit configuration file, layered over the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the effective configuration as TOML
    CheckConfig {
        /// Explicit configuration file, layered over the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<IntakeConfig> {
    let config = match path {
        Some(path) => IntakeConfig::load_from(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => IntakeConfig::load()?,
    };
    Ok(config)
}

async fn serve(mut config: IntakeConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config)?;
    let app = handlers::router(state)?;

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    tracing::info!(address = %address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            observability::init()?;
            let config = load_config(config)?;
            serve(config, host, port).await?;
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config)?;
            config.storage.layout()?;
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
