//! # maildock-smtp
//!
//! An SMTP receiving engine. One [`Session`] state machine runs per
//! connection and drives the dialog from greeting through `MAIL`,
//! `RCPT` and `DATA` to a finished [`Envelope`], which the acceptor
//! hands to a downstream [`EnvelopeSink`].
//!
//! ## Features
//!
//! - **Explicit state machine**: every (state, command) pair resolves to
//!   a deterministic reply; out-of-order commands get 503, never a panic
//! - **STARTTLS**: in-place upgrade via `tokio-rustls`, with pre-upgrade
//!   buffered input discarded
//! - **Authentication**: AUTH PLAIN and AUTH LOGIN with constant-time
//!   credential checks and a hard cap on failed attempts
//! - **Size policy**: per-transaction byte ceiling advertised via the
//!   SIZE extension and enforced during DATA
//! - **Supervision**: connection cap, idle timeout, graceful shutdown
//!
//! ## Quick Start
//!
//! ```ignore
//! use maildock_smtp::{ChannelSink, ServerSettings, serve};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio::sync::{mpsc, watch};
//!
//! #[tokio::main]
//! async fn main() -> maildock_smtp::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8025").await?;
//!     let (tx, mut rx) = mpsc::channel(64);
//!     let (_shutdown_tx, shutdown_rx) = watch::channel(false);
//!
//!     let settings = Arc::new(ServerSettings::new("mail.example.com"));
//!     tokio::spawn(serve(listener, settings, ChannelSink::new(tx), shutdown_rx));
//!
//!     while let Some(envelope) = rx.recv().await {
//!         println!("accepted message from {}", envelope.sender);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: AUTH mechanisms and the credential validator
//! - [`connection`]: plain/TLS stream and TLS acceptor configuration
//! - [`session`]: the per-connection state machine
//! - [`server`]: connection acceptor and session supervisor
//! - [`sink`]: downstream envelope handoff
//! - [`types`]: addresses, commands, replies, envelopes

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod connection;
mod error;
pub mod limits;
pub mod server;
pub mod session;
pub mod sink;
pub mod types;

pub use auth::{AuthMechanism, Credentials};
pub use error::{Error, Result};
pub use server::{ServerSettings, serve};
pub use session::{Action, Session, SessionPolicy};
pub use sink::{ChannelSink, EnvelopeSink, SinkError};
pub use types::{Address, Command, Envelope, EnvelopeBuilder, Reply, ReplyCode};
