//! HTTP control plane.
//!
//! Read-only JSON views over the message store plus server status,
//! gated by bearer tokens. Only the health probe is open.

mod auth;
mod routes;
pub mod token;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use maildock_core::{Config, MessageStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<MessageStore>,
    config: Arc<Config>,
    jwt_secret: String,
}

impl AppState {
    /// Bundles the store, configuration and token secret.
    pub fn new(store: Arc<MessageStore>, config: Arc<Config>, jwt_secret: String) -> Self {
        Self {
            store,
            config,
            jwt_secret,
        }
    }
}

/// Builds the control-plane router.
///
/// `GET /health` answers without a token; everything under `/api`
/// passes through the bearer-token middleware first.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/status", get(routes::status))
        .route("/api/messages", get(routes::list_messages))
        .route("/api/messages/:id", get(routes::get_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
