//! Core SMTP types.

mod address;
mod command;
mod envelope;
mod reply;

pub use address::Address;
pub use command::{Command, ParseError};
pub use envelope::{Envelope, EnvelopeBuilder};
pub use reply::{Reply, ReplyCode};
