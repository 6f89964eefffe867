//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// TLS certificate or key material could not be loaded.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// TLS is already active on this connection.
    #[error("TLS already active")]
    TlsAlreadyActive,

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// A command line exceeded the maximum permitted length.
    #[error("Command line too long")]
    LineTooLong,
}
