use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mindmap_core::config_file;
use mindmap_core::{Config, Extractor};

mod handlers;
mod models;
mod routes;
mod state;
mod template;
mod upload;

use state::AppState;

const DEFAULT_BIND: &str = "0.0.0.0:5001";

#[derive(Parser, Debug)]
#[command(name = "mindmap-web", version, about = "Turn PDFs into interactive mind maps")]
struct Args {
    /// Address to listen on (overrides [server].bind)
    #[arg(long)]
    bind: Option<String>,

    /// Read configuration from this TOML file instead of .mindmap.toml and
    /// the platform config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => config_file::load_from_path(path)
            .with_context(|| format!("cannot load config file {}", path.display()))?,
        None => config_file::load_config(),
    };

    // Missing model or API key is fatal before anything is served.
    let config = Config::from_env(&file)?;
    tracing::info!(?config, "configuration resolved");

    let state = Arc::new(AppState {
        extractor: Extractor::from_config(&config),
        policy: config.intake_policy(),
    });
    let app = routes::router(state);

    let bind = args
        .bind
        .or_else(|| file.server.and_then(|s| s.bind))
        .unwrap_or_else(|| DEFAULT_BIND.to_string());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("cannot bind {bind}"))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
