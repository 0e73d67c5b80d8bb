// 🌐 Webhook HTTP surface (axum)
//
// GET  /chat/message  - Graph API subscription handshake
// POST /chat/message  - inbound message notifications
// GET  /status        - liveness

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::chat::{process_entries, ChatMessage, DispatchOutcome};
use crate::textmsg::MessageSender;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub sender: Arc<dyn MessageSender>,
    /// Webhook verify token (HUB_TOKEN)
    pub hub_token: Option<String>,
}

impl AppState {
    pub fn new(conn: Connection, sender: Arc<dyn MessageSender>, hub_token: Option<String>) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            sender,
            hub_token,
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// Hub challenge
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HubChallengeQuery {
    #[serde(rename = "hub.mode")]
    pub mode: String,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: String,
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum HubChallengeError {
    /// HUB_TOKEN is not configured
    #[error("environment_error")]
    Environment,

    #[error("invalid_mode")]
    InvalidMode,

    #[error("invalid_token")]
    InvalidToken,
}

/// Challenge to echo back when the subscription request is genuine
pub fn verify_hub_challenge(hub_token: Option<&str>, query: &HubChallengeQuery) -> Result<String, HubChallengeError> {
    let expected = hub_token.ok_or(HubChallengeError::Environment)?;

    if query.mode != "subscribe" {
        return Err(HubChallengeError::InvalidMode);
    }
    if query.verify_token != expected {
        return Err(HubChallengeError::InvalidToken);
    }

    Ok(query.challenge.clone())
}

/// GET /chat/message
async fn hub_challenge(State(state): State<AppState>, Query(query): Query<HubChallengeQuery>) -> Response {
    match verify_hub_challenge(state.hub_token.as_deref(), &query) {
        Ok(challenge) => {
            info!("hub challenge accepted");
            (StatusCode::OK, challenge).into_response()
        }
        Err(e) => {
            info!(mode = %query.mode, "hub challenge refused: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

// ============================================================================
// Inbound messages
// ============================================================================

/// POST /chat/message
async fn chat_message(State(state): State<AppState>, body: Bytes) -> Response {
    debug!(body = %String::from_utf8_lossy(&body), "chat message received");

    let chat = match ChatMessage::from_json(&body) {
        Ok(chat) => chat,
        Err(e) => {
            error!("unmarshal error: {}", e);
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::failure(e.to_string()))).into_response();
        }
    };

    // SQLite and the Graph API client both block
    let result = tokio::task::spawn_blocking(move || -> Result<Vec<DispatchOutcome>, String> {
        let conn = state.db.lock().map_err(|_| "database lock poisoned".to_string())?;
        Ok(process_entries(&conn, state.sender.as_ref(), &chat.entries))
    })
    .await;

    match result {
        Ok(Ok(outcomes)) => {
            info!(messages = outcomes.len(), "success handling chat message");
            (StatusCode::OK, Json(ApiResponse::ok(outcomes))).into_response()
        }
        Ok(Err(e)) => {
            error!("error processing entries: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::failure(e))).into_response()
        }
        Err(e) => {
            error!("dispatch task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failure("dispatch task failed")),
            )
                .into_response()
        }
    }
}

/// GET /status
async fn status() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "success", "version": crate::VERSION }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/message", get(hub_challenge).post(chat_message))
        .route("/status", get(status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
