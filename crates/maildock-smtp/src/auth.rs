//! SMTP authentication mechanisms and the credential validator.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Base64 "Username:" prompt sent during the LOGIN dialog.
pub const LOGIN_USERNAME_CHALLENGE: &str = "VXNlcm5hbWU6";
/// Base64 "Password:" prompt sent during the LOGIN dialog.
pub const LOGIN_PASSWORD_CHALLENGE: &str = "UGFzc3dvcmQ6";

/// Supported AUTH mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    /// AUTH PLAIN (RFC 4616): one base64 blob of `\0user\0password`.
    Plain,
    /// AUTH LOGIN: base64 username and password over two challenges.
    Login,
}

impl AuthMechanism {
    /// Parses a mechanism name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            _ => None,
        }
    }

    /// Capability string advertised in the EHLO reply.
    #[must_use]
    pub const fn advertisement() -> &'static str {
        "AUTH PLAIN LOGIN"
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "PLAIN"),
            Self::Login => write!(f, "LOGIN"),
        }
    }
}

/// The configured username/password pair.
///
/// Stateless predicate over presented credentials; safe to share
/// read-only across sessions.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential record.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Checks presented credentials.
    ///
    /// Comparison goes through fixed-length SHA-256 digests so timing
    /// does not depend on how long a matching prefix is.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = digest_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = digest_eq(self.password.as_bytes(), password.as_bytes());
        user_ok & pass_ok
    }
}

/// Constant-time equality over SHA-256 digests of the inputs.
fn digest_eq(expected: &[u8], presented: &[u8]) -> bool {
    let expected = Sha256::digest(expected);
    let presented = Sha256::digest(presented);
    expected
        .iter()
        .zip(presented.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Decodes an AUTH PLAIN payload into (username, password).
///
/// The payload is base64 over `authzid \0 authcid \0 password`; the
/// authorization identity is ignored.
#[must_use]
pub fn decode_plain(payload: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let mut fields = decoded.split('\0');
    let _authzid = fields.next()?;
    let username = fields.next()?.to_string();
    let password = fields.next()?.to_string();
    if fields.next().is_some() {
        return None;
    }
    Some((username, password))
}

/// Decodes one base64 line of the LOGIN dialog.
#[must_use]
pub fn decode_login_field(payload: &str) -> Option<String> {
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mechanism_parse() {
        assert_eq!(AuthMechanism::parse("PLAIN"), Some(AuthMechanism::Plain));
        assert_eq!(AuthMechanism::parse("login"), Some(AuthMechanism::Login));
        assert_eq!(AuthMechanism::parse("XOAUTH2"), None);
    }

    #[test]
    fn test_verify_accepts_exact_match() {
        let creds = Credentials::new("user", "secret");
        assert!(creds.verify("user", "secret"));
    }

    #[test]
    fn test_verify_rejects_wrong_password() {
        let creds = Credentials::new("user", "secret");
        assert!(!creds.verify("user", "secre"));
        assert!(!creds.verify("user", "secretx"));
        assert!(!creds.verify("user", ""));
    }

    #[test]
    fn test_verify_rejects_wrong_username() {
        let creds = Credentials::new("user", "secret");
        assert!(!creds.verify("admin", "secret"));
    }

    #[test]
    fn test_decode_plain() {
        // base64("\0user\0secret")
        let payload = STANDARD.encode(b"\0user\0secret");
        let (username, password) = decode_plain(&payload).unwrap();
        assert_eq!(username, "user");
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_decode_plain_with_authzid() {
        let payload = STANDARD.encode(b"authz\0user\0secret");
        let (username, password) = decode_plain(&payload).unwrap();
        assert_eq!(username, "user");
        assert_eq!(password, "secret");
    }

    #[test]
    fn test_decode_plain_rejects_garbage() {
        assert!(decode_plain("not base64!!!").is_none());
        assert!(decode_plain(&STANDARD.encode(b"missing-separators")).is_none());
        assert!(decode_plain(&STANDARD.encode(b"a\0b\0c\0d")).is_none());
    }

    #[test]
    fn test_decode_login_field() {
        assert_eq!(decode_login_field("dXNlcg==").unwrap(), "user");
        assert!(decode_login_field("???").is_none());
    }

    #[test]
    fn test_login_challenges_decode() {
        assert_eq!(
            decode_login_field(LOGIN_USERNAME_CHALLENGE).unwrap(),
            "Username:"
        );
        assert_eq!(
            decode_login_field(LOGIN_PASSWORD_CHALLENGE).unwrap(),
            "Password:"
        );
    }
}
