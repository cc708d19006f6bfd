//! hourglass-analyzer - review analysis service
//!
//! Fetches Steam reviews for an app, tags time-related themes (length,
//! grind, value), scores theme-scoped sentiment and serves the aggregates,
//! a paginated review feed and a CSV export over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hourglass_analyzer::services::{AnalysisCache, FetchClient, SteamReviewSource};
use hourglass_analyzer::utils::RetryPolicy;
use hourglass_analyzer::AppState;
use hourglass_common::config::{load_config, resolve_config_path, write_toml_config, TomlConfig};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for hourglass-analyzer
#[derive(Parser, Debug)]
#[command(name = "hourglass-analyzer")]
#[command(about = "Time-themed Steam review analysis service")]
#[command(version)]
struct Args {
    /// TOML config file (overrides HOURGLASS_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides [server] host)
    #[arg(long, env = "HOURGLASS_HOST")]
    host: Option<String>,

    /// Port to listen on (overrides [server] port)
    #[arg(short, long, env = "HOURGLASS_PORT")]
    port: Option<u16>,

    /// Write a config file with built-in defaults and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.init_config {
        let path = args
            .config
            .clone()
            .or_else(|| resolve_config_path(None))
            .or_else(|| dirs::config_dir().map(|d| d.join("hourglass").join("hourglass.toml")))
            .context("No config path given and no platform config directory")?;
        write_toml_config(&TomlConfig::default(), &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting hourglass-analyzer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        upstream = %config.upstream.base_url,
        requests_per_second = config.upstream.requests_per_second,
        cache_ttl_secs = config.cache.ttl_secs,
        cache_max_entries = config.cache.max_entries,
        "Configuration loaded"
    );

    let source = SteamReviewSource::new(&config.upstream)
        .context("Failed to initialize upstream review client")?;
    let fetcher = FetchClient::new(
        Arc::new(source),
        config.upstream.page_size,
        RetryPolicy::from_config(&config.upstream),
    );
    let cache = Arc::new(AnalysisCache::new(fetcher, &config.cache));

    let state = AppState::new(cache, &config);
    let app = hourglass_analyzer::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
