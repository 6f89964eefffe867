//! TLS acceptor configuration from PEM material.

use crate::error::{Error, Result};
use rustls::ServerConfig;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Loads a rustls server config from PEM certificate and key files.
///
/// # Errors
///
/// Returns an error if either file cannot be read, contains no usable
/// material, or the certificate/key pair is rejected by rustls.
pub fn load_server_config(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
) -> Result<Arc<ServerConfig>> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::TlsConfig(format!("{}: {e}", cert_path.display())))?;
    if certs.is_empty() {
        return Err(Error::TlsConfig(format!(
            "{}: no certificates found",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| Error::TlsConfig(format!("{}: {e}", key_path.display())))?
        .ok_or_else(|| {
            Error::TlsConfig(format!("{}: no private key found", key_path.display()))
        })?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

/// Builds a TLS acceptor for STARTTLS upgrades.
#[must_use]
pub fn build_acceptor(config: Arc<ServerConfig>) -> TlsAcceptor {
    TlsAcceptor::from(config)
}
