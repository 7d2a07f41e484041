// ABOUTME: Entry point for the docshare binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and serves the HTTP API or imports a catalog.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docshare_server::{AppState, DocshareConfig, create_router};
use docshare_store::{CatalogSeed, SqliteCatalog};

#[derive(Debug, Parser)]
#[command(name = "docshare", version, about = "Share API documentation with external viewers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Load modules, definitions, plugin scripts, and members from a YAML file.
    Import {
        /// Path to the catalog YAML file.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("docshare=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = DocshareConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Import { file } => import(&config, &file),
    }
}

async fn serve(config: DocshareConfig) -> anyhow::Result<()> {
    tracing::info!(home = %config.home.display(), "docshare starting up");

    let state = Arc::new(AppState::open(&config)?);
    let app = create_router(state, config.auth_token.clone());

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        auth = config.auth_token.is_some(),
        "docshare listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("docshare shutting down");
        })
        .await?;
    Ok(())
}

fn import(config: &DocshareConfig, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let seed: CatalogSeed = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    std::fs::create_dir_all(&config.home)?;
    let catalog = SqliteCatalog::open(&config.db_path(), config.default_protocol.clone())?;
    let summary = catalog.import(&seed)?;
    println!(
        "imported {} modules, {} definitions, {} scripts, {} members",
        summary.modules, summary.definitions, summary.scripts, summary.members
    );
    Ok(())
}
