//! EconStat Server: econometric analysis over HTTP.
//!
//! Users register, upload CSV or Excel datasets or pick World Bank indicators, and run
//! pooled OLS, IV-2SLS, fixed- or random-effects regressions. Every run is
//! kept as a study in the caller's history.
//!
//! # Endpoints
//!
//! - `POST /v1/register`, `POST /v1/token`, `GET /v1/users/me`
//! - `POST /v1/datasets`, `GET /v1/datasets`
//! - `POST /v1/analysis`
//! - `GET  /v1/studies`, `GET /v1/studies/popular`
//! - `GET  /v1/health`
//!
//! All state lives in memory and is lost on restart.

mod auth;
mod config;
mod popularity;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use clap::Parser;
use ec_data::WorldBankClient;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use state::AppState;

/// EconStat server: econometric studies over World Bank and uploaded data.
///
/// Accounts, uploaded datasets and study history are held in memory only.
/// Restarting the server clears them, including the history behind
/// /v1/studies/popular.
#[derive(Parser, Debug)]
#[command(name = "econstat-server", version = ec_core::VERSION, about, long_about)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long, default_value = "8000", env = "ECONSTAT_PORT")]
    port: u16,

    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "ECONSTAT_HOST")]
    host: String,

    /// TOML config file (`[indicators]`, `[world_bank]`).
    #[arg(long, env = "ECONSTAT_CONFIG")]
    config: Option<PathBuf>,

    /// Lifetime of issued access tokens, in seconds.
    #[arg(long, default_value = "3600", env = "ECONSTAT_TOKEN_TTL_SECS")]
    token_ttl_secs: u64,

    /// Maximum request body size in MiB (applies to all endpoints).
    #[arg(long, default_value = "16")]
    max_body_mb: usize,

    /// Override `[world_bank].base_url`.
    #[arg(long, env = "ECONSTAT_WORLD_BANK_URL")]
    world_bank_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    if let Some(url) = cli.world_bank_url {
        config.world_bank.base_url = url;
    }
    let catalog = config.catalog();
    let source = WorldBankClient::new(config.world_bank.clone())?;

    let state = Arc::new(AppState::new(catalog, Arc::new(source), Duration::from_secs(cli.token_ttl_secs)));

    let max_body_bytes = mb_to_bytes(cli.max_body_mb);

    let app = routes::router(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    tracing::info!(
        %addr,
        world_bank = %config.world_bank.base_url,
        indicators = config.catalog().len(),
        version = ec_core::VERSION,
        "econstat-server starting"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn mb_to_bytes(mb: usize) -> usize {
    mb.saturating_mul(1024).saturating_mul(1024)
}
