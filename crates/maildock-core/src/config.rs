//! Environment-driven server configuration.

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Complete server configuration.
///
/// Loaded once at startup via [`Config::from_env`] and never mutated;
/// the rest of the process sees it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// SMTP listener bind address.
    pub smtp_host: String,
    /// SMTP listener port.
    pub smtp_port: u16,
    /// Hostname announced in SMTP greetings.
    pub hostname: String,
    /// HTTP control-plane bind address.
    pub http_host: String,
    /// HTTP control-plane port.
    pub http_port: u16,
    /// Whether SMTP authentication is required.
    pub enable_auth: bool,
    /// SMTP username, required when auth is enabled.
    pub smtp_username: Option<String>,
    /// SMTP password, required when auth is enabled.
    pub smtp_password: Option<String>,
    /// Whether STARTTLS is offered.
    pub enable_tls: bool,
    /// Whether plaintext commands beyond the handshake set are refused.
    pub require_tls: bool,
    /// PEM certificate chain, required when TLS is enabled.
    pub tls_certfile: Option<PathBuf>,
    /// PEM private key, required when TLS is enabled.
    pub tls_keyfile: Option<PathBuf>,
    /// Maximum DATA payload size in bytes.
    pub max_message_size: usize,
    /// Maximum concurrent SMTP connections.
    pub max_connections: usize,
    /// Idle seconds before an SMTP connection is closed.
    pub idle_timeout_secs: u64,
    /// HMAC secret for control-plane bearer tokens.
    pub jwt_secret_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smtp_host: "0.0.0.0".to_string(),
            smtp_port: 8025,
            hostname: "localhost".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8000,
            enable_auth: false,
            smtp_username: None,
            smtp_password: None,
            enable_tls: false,
            require_tls: false,
            tls_certfile: None,
            tls_keyfile: None,
            max_message_size: 26_214_400, // 25 MiB
            max_connections: 64,
            idle_timeout_secs: 300,
            jwt_secret_key: None,
        }
    }
}

impl Config {
    /// Loads configuration from the environment and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable fails to parse or the combination
    /// is invalid (see [`validate`](Self::validate)).
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            smtp_host: env_or("SMTP_HOST", defaults.smtp_host),
            smtp_port: env_parse("SMTP_PORT", defaults.smtp_port)?,
            hostname: env_or("SMTP_HOSTNAME", defaults.hostname),
            http_host: env_or("HTTP_HOST", defaults.http_host),
            http_port: env_parse("HTTP_PORT", defaults.http_port)?,
            enable_auth: env_bool("ENABLE_AUTH")?,
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            enable_tls: env_bool("ENABLE_TLS")?,
            require_tls: env_bool("REQUIRE_TLS")?,
            tls_certfile: env::var("TLS_CERTFILE").ok().map(PathBuf::from),
            tls_keyfile: env::var("TLS_KEYFILE").ok().map(PathBuf::from),
            max_message_size: env_parse("MAX_MESSAGE_SIZE", defaults.max_message_size)?,
            max_connections: env_parse("MAX_CONNECTIONS", defaults.max_connections)?,
            idle_timeout_secs: env_parse("IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
            jwt_secret_key: env::var("JWT_SECRET_KEY").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns an error if auth is enabled without credentials, TLS is
    /// enabled without certificate material, or TLS is required without
    /// being enabled.
    pub fn validate(&self) -> Result<()> {
        if self.enable_auth && (self.smtp_username.is_none() || self.smtp_password.is_none()) {
            return Err(Error::Config(
                "SMTP_USERNAME and SMTP_PASSWORD must be set when authentication is enabled"
                    .to_string(),
            ));
        }

        if self.enable_tls && (self.tls_certfile.is_none() || self.tls_keyfile.is_none()) {
            return Err(Error::Config(
                "TLS_CERTFILE and TLS_KEYFILE must be set when TLS is enabled".to_string(),
            ));
        }

        if self.require_tls && !self.enable_tls {
            return Err(Error::Config(
                "REQUIRE_TLS needs ENABLE_TLS and certificate material".to_string(),
            ));
        }

        Ok(())
    }

    /// SMTP bind address as `host:port`.
    #[must_use]
    pub fn smtp_addr(&self) -> String {
        format!("{}:{}", self.smtp_host, self.smtp_port)
    }

    /// HTTP bind address as `host:port`.
    #[must_use]
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

fn env_or(name: &str, default: String) -> String {
    env::var(name).unwrap_or(default)
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| Error::Config(format!("{name} has invalid value: {value}"))),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(Error::Config(format!(
                "{name} must be true or false, got: {other}"
            ))),
        },
        Err(_) => Ok(false),
    }
}
