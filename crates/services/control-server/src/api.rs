//! HTTP API of the control server
//!
//! - `POST /control` - apply an action (`{"action": ..., "state": ...}`)
//! - `GET /player` - current player state, `204` while no session is active
//! - `GET /health` - liveness
//!
//! `/control` and `/player` require `Authorization: Bearer <token>`.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::player::{Action, SharedPlayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub player: SharedPlayer,
    pub access_token: Arc<str>,
}

impl AppState {
    pub fn new(player: SharedPlayer, access_token: impl Into<Arc<str>>) -> Self {
        Self {
            player,
            access_token: access_token.into(),
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == &*self.access_token)
    }
}

/// Request body for `POST /control`
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub action: String,
    #[serde(default)]
    pub state: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

fn error_response(status: StatusCode, error: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
        .into_response()
}

fn unauthorized() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "missing or invalid bearer token".to_string(),
    )
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/control", post(control))
        .route("/player", get(player_state))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Apply a control action
///
/// POST /control
async fn control(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<ControlRequest>) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let action = match Action::parse(&req.action, req.state.as_ref()) {
        Ok(action) => action,
        Err(e) => {
            tracing::warn!(action = %req.action, "Rejected control request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "invalid_action", e.to_string());
        }
    };

    state.player.lock().apply(action);
    (StatusCode::OK, Json(ControlResponse { status: "success" })).into_response()
}

/// Current player state
///
/// GET /player
async fn player_state(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let snapshot = state.player.lock().snapshot();
    match snapshot {
        Some(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
