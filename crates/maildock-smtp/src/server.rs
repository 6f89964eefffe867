//! Connection acceptor and session supervisor.

use crate::auth::Credentials;
use crate::connection::{SmtpStream, build_acceptor};
use crate::error::{Error, Result};
use crate::session::{Action, Session, SessionPolicy};
use crate::sink::EnvelopeSink;
use crate::types::{Envelope, Reply, ReplyCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, watch};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;

/// How long a sink handoff may stall the success reply.
const SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Hostname announced in the greeting and EHLO replies.
    pub hostname: String,
    /// Maximum DATA payload size in bytes.
    pub max_message_size: usize,
    /// Maximum concurrent connections; further accepts queue on the
    /// connection semaphore.
    pub max_connections: usize,
    /// Idle time after which a connection is closed with 421.
    pub idle_timeout: Duration,
    /// Refuse plaintext commands beyond the handshake set.
    pub require_tls: bool,
    /// Credentials; authentication is required exactly when set.
    pub credentials: Option<Credentials>,
    /// TLS server config; STARTTLS is offered exactly when set.
    pub tls: Option<Arc<rustls::ServerConfig>>,
}

impl ServerSettings {
    /// Settings with conventional defaults: 25 MiB ceiling, 64
    /// connections, 300 second idle timeout, no TLS, no auth.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            max_message_size: 25 * 1024 * 1024,
            max_connections: 64,
            idle_timeout: Duration::from_secs(300),
            require_tls: false,
            credentials: None,
            tls: None,
        }
    }

    fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            hostname: self.hostname.clone(),
            size_ceiling: self.max_message_size,
            tls_available: self.tls.is_some(),
            require_tls: self.require_tls,
            credentials: self.credentials.clone(),
        }
    }
}

/// Accepts connections until the shutdown signal fires.
///
/// One task per connection; the connection count is bounded by a
/// semaphore, so accepts past the cap queue rather than fail. On
/// shutdown, active sessions get a 421 goodbye.
///
/// # Errors
///
/// Returns an error if the listener itself fails; per-connection errors
/// are logged and absorbed.
pub async fn serve<S>(
    listener: TcpListener,
    settings: Arc<ServerSettings>,
    sink: S,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    S: EnvelopeSink + Clone + 'static,
{
    let semaphore = Arc::new(Semaphore::new(settings.max_connections));
    let acceptor = settings.tls.clone().map(build_acceptor);
    let policy = Arc::new(settings.session_policy());

    tracing::info!(
        hostname = %settings.hostname,
        max_connections = settings.max_connections,
        tls = acceptor.is_some(),
        auth = settings.credentials.is_some(),
        "smtp server listening"
    );

    loop {
        let permit = tokio::select! {
            _ = shutdown.changed() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            break;
        };

        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };

        tracing::debug!(%peer, "connection accepted");
        let policy = Arc::clone(&policy);
        let settings = Arc::clone(&settings);
        let acceptor = acceptor.clone();
        let sink = sink.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) =
                handle_connection(stream, peer, policy, settings, acceptor, sink, shutdown).await
            {
                tracing::debug!(%peer, error = %e, "connection ended with error");
            }
            tracing::debug!(%peer, "connection closed");
        });
    }

    tracing::info!("smtp server shutting down");
    Ok(())
}

/// What one read attempt produced.
enum ReadEvent {
    Line(String),
    TooLong,
    Eof,
    IdleTimeout,
    Shutdown,
    Failed(Error),
}

#[allow(clippy::too_many_lines)]
async fn handle_connection<S: EnvelopeSink>(
    stream: TcpStream,
    peer: SocketAddr,
    policy: Arc<SessionPolicy>,
    settings: Arc<ServerSettings>,
    acceptor: Option<TlsAcceptor>,
    sink: S,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut stream = SmtpStream::new(stream);
    let mut session = Session::new(policy, peer);
    write_reply(&mut stream, &session.greeting()).await?;

    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => ReadEvent::Shutdown,
            read = timeout(settings.idle_timeout, stream.read_line()) => match read {
                Err(_) => ReadEvent::IdleTimeout,
                Ok(Ok(Some(line))) => ReadEvent::Line(line),
                Ok(Ok(None)) => ReadEvent::Eof,
                Ok(Err(Error::LineTooLong)) => ReadEvent::TooLong,
                Ok(Err(e)) => ReadEvent::Failed(e),
            },
        };

        let action = match event {
            ReadEvent::Line(line) => session.handle_line(&line),
            ReadEvent::TooLong => session.line_too_long(),
            ReadEvent::Eof => return Ok(()),
            ReadEvent::Failed(e) => return Err(e),
            ReadEvent::IdleTimeout => {
                let goodbye = Reply::single(
                    ReplyCode::SERVICE_UNAVAILABLE,
                    "Idle timeout, closing connection",
                );
                write_reply(&mut stream, &goodbye).await?;
                tracing::debug!(%peer, "idle timeout");
                return Ok(());
            }
            ReadEvent::Shutdown => {
                let goodbye =
                    Reply::single(ReplyCode::SERVICE_UNAVAILABLE, "Service shutting down");
                write_reply(&mut stream, &goodbye).await?;
                return Ok(());
            }
        };

        match action {
            Action::Continue => {}
            Action::Reply(reply) => write_reply(&mut stream, &reply).await?,
            Action::ReplyThenClose(reply) => {
                write_reply(&mut stream, &reply).await?;
                return Ok(());
            }
            Action::UpgradeTls(reply) => {
                let Some(acceptor) = acceptor.as_ref() else {
                    // Session offers STARTTLS only when TLS is configured.
                    let unavailable =
                        Reply::single(ReplyCode::TLS_UNAVAILABLE, "TLS not available");
                    write_reply(&mut stream, &unavailable).await?;
                    continue;
                };
                write_reply(&mut stream, &reply).await?;
                stream = match stream.upgrade_to_tls(acceptor).await {
                    Ok(upgraded) => upgraded,
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "tls handshake failed");
                        return Ok(());
                    }
                };
                session.tls_established();
                tracing::debug!(%peer, "tls established");
            }
            Action::Accepted(reply, envelope) => {
                deliver(&sink, *envelope).await;
                write_reply(&mut stream, &reply).await?;
            }
        }
    }
}

async fn write_reply(stream: &mut SmtpStream, reply: &Reply) -> Result<()> {
    stream.write_all(reply.to_wire().as_bytes()).await
}

/// Bounded, best-effort handoff to the sink.
///
/// The SMTP client already earned its success reply once the terminator
/// was consumed, so sink faults are logged rather than reported on the
/// wire.
async fn deliver<S: EnvelopeSink>(sink: &S, envelope: Envelope) {
    match timeout(SINK_TIMEOUT, sink.accept(envelope)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "envelope sink rejected message"),
        Err(_) => tracing::error!("envelope sink timed out"),
    }
}
