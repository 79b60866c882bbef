//! End-session endpoint server.
//!
//! Loads the configuration, builds the end-session pipeline and serves the
//! endpoint until Ctrl+C.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use end_session::cache::InMemoryCache;
use end_session::config::{load_config, EndSessionOptions, ServiceConfig};
use end_session::http::EndSessionServer;
use end_session::observability::{logging, metrics};
use end_session::service::EndSessionService;
use end_session::token::LocalTokenService;

/// Longest pause between sweeps of expired cached requests.
const MAX_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "end-session", version, about = "OpenID Connect end-session endpoint")]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "end-session starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoint = %config.end_session.endpoint_path,
        request_caching = config.end_session.enable_request_caching,
        passthrough = config.end_session.enable_passthrough,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let tokens = LocalTokenService::from_config(&config.credentials)?;
    let options = EndSessionOptions::from_config(&config)?;
    let cache = InMemoryCache::new();
    let purge_every = options
        .request_cache_ttl
        .clamp(Duration::from_secs(1), MAX_PURGE_INTERVAL);
    let purge_task = cache.spawn_purge_task(purge_every);
    let service = EndSessionService::new(options, Arc::new(cache), Arc::new(tokens))?;
    let server = EndSessionServer::new(&config, service)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener).await?;
    purge_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
