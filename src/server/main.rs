//! This server keeps rider balances and deducts bus fares for scanned QR
//! codes. Riders authenticate with HS256 JWTs signed with `JWT_SECRET`.
use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use farepass::{config::ServerConfig, routes::router, state::AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Waits for Ctrl-C so in-flight requests can finish.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }

    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("FAREPASS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("server.toml"));
    let config = ServerConfig::load(Some(&config_path)).context("failed to load server config")?;

    // setup logging
    let (writer, _guard) = match &config.log_dir {
        Some(dir) => tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "server.log")),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("server=debug,farepass=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();

    std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

    let fleet = config.fleet();
    info!("serving {} buses", fleet.len());

    let app = router(AppState::new(fleet).shared());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("listening on {addr}");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    Ok(())
}
