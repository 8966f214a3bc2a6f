//! Remote playback controller client
//!
//! The remote is both the command sink and the source of truth for playback
//! state. Other clients may change it at any time.
//!
//! - `POST {base_url}{control_path}` with a [`wire::ControlRequest`] body
//! - `GET {base_url}{state_path}`: `204` means no active session, `200`
//!   carries a [`wire::PlayerStateResponse`]
//!
//! Both requests send `Authorization: Bearer <token>`.

pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::credential::Credential;
use crate::playback::PlaybackCommand;
use crate::{Error, Result};

/// Raw answer to a state request
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteSnapshot {
    /// Player state body, not yet validated
    Active(Value),
    /// Remote has no active playback session
    NoSession,
}

/// Command sink and state source
#[async_trait]
pub trait PlaybackRemote: Send + Sync {
    /// Send one command. Single attempt.
    async fn send_command(&self, command: PlaybackCommand, credential: &Credential) -> Result<()>;

    /// Fetch the current player state
    async fn fetch_state(&self, credential: &Credential) -> Result<RemoteSnapshot>;
}

/// Endpoint layout of an HTTP remote
#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    /// Base URL (e.g., "http://localhost:5000")
    pub base_url: String,
    pub control_path: String,
    pub state_path: String,
    /// Budget for each request, connect included
    pub request_timeout: Duration,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            control_path: "/control".to_string(),
            state_path: "/player".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Remote reached over HTTP/JSON
pub struct HttpPlaybackRemote {
    config: HttpRemoteConfig,
    client: reqwest::Client,
}

impl HttpPlaybackRemote {
    /// Create a new HTTP remote
    ///
    /// Fails if `base_url` is not an `http://` or `https://` URL.
    pub fn new(config: HttpRemoteConfig) -> Result<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "remote base_url must start with http:// or https://, got: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn error_for_status(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Error::Transport(format!(
            "HTTP {} {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            body
        ))
    }
}

#[async_trait]
impl PlaybackRemote for HttpPlaybackRemote {
    async fn send_command(&self, command: PlaybackCommand, credential: &Credential) -> Result<()> {
        let body = wire::ControlRequest::from(&command);
        let response = self
            .client
            .post(self.url(&self.config.control_path))
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("control request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }
        Ok(())
    }

    async fn fetch_state(&self, credential: &Credential) -> Result<RemoteSnapshot> {
        let response = self
            .client
            .get(self.url(&self.config.state_path))
            .header(reqwest::header::AUTHORIZATION, credential.bearer_header())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("state request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(RemoteSnapshot::NoSession);
        }
        if !status.is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| Error::StaleRemoteState(format!("state body is not JSON: {}", e)))?;
        Ok(RemoteSnapshot::Active(body))
    }
}
