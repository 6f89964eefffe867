//! Downstream handoff of accepted envelopes.

use crate::types::Envelope;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Why a sink refused or failed an envelope handoff.
#[derive(Debug, thiserror::Error)]
#[error("envelope sink unavailable: {0}")]
pub struct SinkError(pub String);

/// Consumer of completed envelopes.
///
/// Called exactly once per successfully completed DATA transaction.
/// The call is best-effort from the protocol's point of view: by the
/// time the sink runs, the SMTP client has earned its success reply,
/// so a failing sink is logged rather than reported on the wire.
pub trait EnvelopeSink: Send + Sync {
    /// Accepts one finished envelope.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the envelope could not be taken.
    fn accept(&self, envelope: Envelope) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// A shared sink delegates to the inner one, so stores and other
/// stateful sinks can live behind an `Arc` and still satisfy the
/// `Clone` bound on [`serve`](crate::server::serve).
impl<S: EnvelopeSink> EnvelopeSink for Arc<S> {
    async fn accept(&self, envelope: Envelope) -> Result<(), SinkError> {
        self.as_ref().accept(envelope).await
    }
}

/// Sink that forwards envelopes over a bounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelSink {
    /// Wraps a channel sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }
}

impl EnvelopeSink for ChannelSink {
    async fn accept(&self, envelope: Envelope) -> Result<(), SinkError> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| SinkError("channel receiver dropped".to_string()))
    }
}
