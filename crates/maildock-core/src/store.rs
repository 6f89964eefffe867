//! In-memory storage of accepted messages.

use maildock_smtp::{Envelope, EnvelopeSink, SinkError};
use serde::Serialize;
use tokio::sync::RwLock;

/// An accepted message with its store-assigned id.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    /// Monotonically increasing id, 1-based.
    pub id: u64,
    /// The accepted envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
}

/// Append-only in-memory message store.
///
/// Implements [`EnvelopeSink`]; shared behind an `Arc` so the SMTP
/// server can write while the control plane reads.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: RwLock<Vec<StoredMessage>>,
}

impl MessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an envelope and returns its assigned id.
    pub async fn add(&self, envelope: Envelope) -> u64 {
        let mut messages = self.messages.write().await;
        let id = messages.len() as u64 + 1;
        messages.push(StoredMessage { id, envelope });
        id
    }

    /// All stored messages in arrival order.
    pub async fn list(&self) -> Vec<StoredMessage> {
        self.messages.read().await.clone()
    }

    /// Looks up one message by id.
    pub async fn get(&self, id: u64) -> Option<StoredMessage> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Number of stored messages.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// True if nothing has been stored yet.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl EnvelopeSink for MessageStore {
    async fn accept(&self, envelope: Envelope) -> Result<(), SinkError> {
        let id = self.add(envelope).await;
        tracing::debug!(id, "message stored");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use maildock_smtp::{Address, EnvelopeBuilder};
    use std::sync::Arc;

    fn envelope(sender: &str) -> Envelope {
        let mut builder = EnvelopeBuilder::new(Address::new(sender).unwrap(), 1024);
        builder.add_recipient(Address::new("rcpt@example.com").unwrap());
        builder.push_data_line("Subject: test");
        builder.push_data_line("");
        builder.push_data_line("body");
        builder.finish("127.0.0.1:1234".parse().unwrap())
    }

    #[tokio::test]
    async fn add_assigns_sequential_ids() {
        let store = MessageStore::new();
        assert_eq!(store.add(envelope("a@x.com")).await, 1);
        assert_eq!(store.add(envelope("b@x.com")).await, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn get_finds_by_id() {
        let store = MessageStore::new();
        store.add(envelope("a@x.com")).await;
        store.add(envelope("b@x.com")).await;

        let second = store.get(2).await.unwrap();
        assert_eq!(second.envelope.sender.as_str(), "b@x.com");
        assert!(store.get(99).await.is_none());
    }

    #[tokio::test]
    async fn sink_impl_stores() {
        let store = Arc::new(MessageStore::new());
        let sink = Arc::clone(&store);
        sink.accept(envelope("a@x.com")).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
