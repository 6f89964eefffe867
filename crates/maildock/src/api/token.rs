//! Signing and verification of control-plane bearer tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Claims carried by a control-plane token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Holder identifier.
    pub sub: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Issue time, unix seconds.
    pub iat: i64,
}

/// Signs a token for `subject` that expires after `days` days.
///
/// # Errors
///
/// Returns an error if signing fails.
pub fn issue(secret: &str, subject: &str, days: i64) -> jsonwebtoken::errors::Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        exp: (now + Duration::days(days)).timestamp(),
        iat: now.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Checks signature and expiry, returning the claims.
///
/// # Errors
///
/// Returns an error for a malformed, tampered or expired token.
pub fn verify(secret: &str, token: &str) -> jsonwebtoken::errors::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}
