//! # maildock-mime
//!
//! MIME message parsing for the maildock SMTP server.
//!
//! This crate handles the receiving side of MIME: it takes the raw bytes
//! accumulated during an SMTP `DATA` transaction and turns them into a
//! structured [`Message`] with headers, decoded bodies, and multipart
//! support.
//!
//! ## Quick Start
//!
//! ```
//! use maildock_mime::Message;
//!
//! let raw = "From: sender@example.com\r\n\
//!            To: recipient@example.com\r\n\
//!            Subject: Test\r\n\
//!            Content-Type: text/plain\r\n\
//!            \r\n\
//!            Hello, World!";
//!
//! let message = Message::parse(raw).unwrap();
//! assert_eq!(message.subject().as_deref(), Some("Test"));
//! ```
//!
//! ## Modules
//!
//! - [`address`]: Address-list extraction from To/Cc headers
//! - [`encoding`]: Base64, Quoted-Printable, RFC 2047 decoding
//! - [`Headers`]: Header collection with folding support
//! - [`Message`]: Parsed message with multipart handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
