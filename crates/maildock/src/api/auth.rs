//! Bearer-token middleware for the protected routes.

use super::{AppState, token};
use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Rejects any request that lacks a valid bearer token.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented.map(|t| token::verify(&state.jwt_secret, t)) {
        Some(Ok(claims)) => {
            tracing::debug!(subject = %claims.sub, "authorized request");
            next.run(request).await
        }
        Some(Err(e)) => {
            tracing::debug!(error = %e, "token rejected");
            unauthorized()
        }
        None => unauthorized(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": "Invalid or expired token" })),
    )
        .into_response()
}
