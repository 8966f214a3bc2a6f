//! Control Server Binary
//!
//! Serves the in-memory player until Ctrl+C / SIGTERM.

use anyhow::Result;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gesturemedia_control_server::{player::Player, ControlServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(bind = %config.bind_address, "Starting control server...");

    let server = ControlServer::start(config, Player::default()).await?;

    shutdown_signal().await?;
    tracing::info!("Shutdown signal received, initiating graceful shutdown...");

    server.shutdown().await
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c().await?;

    Ok(())
}
