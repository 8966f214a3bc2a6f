//! GestureMedia Control Server
//!
//! Reference remote playback controller. Holds an in-memory player and
//! exposes it over HTTP/JSON the way GestureMedia clients expect:
//! `POST /control` to act on it and `GET /player` to read it back.
//!
//! Used both as a demo backend and, through [`ControlServer::start`], as an
//! in-process fixture for end-to-end tests.

pub mod api;
pub mod player;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::{build_router, AppState};
use crate::player::{Player, SharedPlayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Bearer token clients must present
    pub access_token: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            access_token: "dev-token".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(addr) = std::env::var("CONTROL_BIND_ADDRESS") {
            config.bind_address = addr;
        }
        if let Ok(token) = std::env::var("CONTROL_ACCESS_TOKEN") {
            config.access_token = token;
        }
        config
    }
}

/// Running control server
pub struct ControlServer {
    addr: SocketAddr,
    player: SharedPlayer,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<std::io::Result<()>>>,
}

impl ControlServer {
    /// Bind and serve in the background
    pub async fn start(config: ServerConfig, player: Player) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_address).await?;
        let addr = listener.local_addr()?;
        let player = player.into_shared();
        let router = build_router(AppState::new(player.clone(), config.access_token));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
        });

        tracing::info!("Control server listening on {}", addr);

        Ok(Self {
            addr,
            player,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for clients (e.g., "http://127.0.0.1:5000")
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Direct access to the player, for out-of-band changes
    pub fn player(&self) -> &SharedPlayer {
        &self.player
    }

    /// Stop accepting requests and wait for in-flight ones
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.await??;
        }
        tracing::info!("Control server stopped");
        Ok(())
    }
}
