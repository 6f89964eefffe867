//! # maildock-core
//!
//! Shared runtime pieces for the maildock SMTP server:
//! - Configuration loaded from the environment, validated once at
//!   startup and immutable afterwards
//! - The in-memory message store that accepts envelopes from the SMTP
//!   engine and serves them to the control plane

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use store::{MessageStore, StoredMessage};
