//! Control-plane request handlers.

use super::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use maildock_core::StoredMessage;
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Serialize)]
pub struct Health {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

/// Liveness probe, no token required.
#[allow(clippy::unused_async)]
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Body of `GET /api/status`.
#[derive(Serialize)]
pub struct Status {
    status: &'static str,
    smtp_server: SmtpStatus,
    messages_stored: usize,
    version: &'static str,
}

/// SMTP listener summary inside [`Status`].
#[derive(Serialize)]
pub struct SmtpStatus {
    host: String,
    port: u16,
    tls_enabled: bool,
    auth_enabled: bool,
}

/// Server and SMTP listener status.
pub async fn status(State(state): State<AppState>) -> Json<Status> {
    Json(Status {
        status: "running",
        smtp_server: SmtpStatus {
            host: state.config.smtp_host.clone(),
            port: state.config.smtp_port,
            tls_enabled: state.config.enable_tls,
            auth_enabled: state.config.enable_auth,
        },
        messages_stored: state.store.len().await,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// All stored messages in arrival order.
pub async fn list_messages(State(state): State<AppState>) -> Json<Vec<StoredMessage>> {
    Json(state.store.list().await)
}

/// One message by id; 404 when no such id exists.
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<StoredMessage>, StatusCode> {
    state
        .store
        .get(id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
