//! Message envelopes assembled during an SMTP transaction.

use crate::limits::SizeGuard;
use crate::types::Address;
use chrono::{DateTime, Utc};
use maildock_mime::{Headers, Message, Part};
use serde::Serialize;
use std::net::SocketAddr;

/// One accepted message, frozen when the DATA terminator arrives.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Sender mailbox from MAIL FROM.
    pub sender: Address,
    /// Flat recipient list in RCPT TO arrival order.
    pub recipients: Vec<Address>,
    /// Recipients named in the message's To header.
    pub recipients_to: Vec<Address>,
    /// Recipients named in the message's Cc header.
    pub recipients_cc: Vec<Address>,
    /// Recipients from the flat list that appear in neither header.
    ///
    /// Classification is a policy choice: SMTP itself has no Bcc
    /// concept, so this is the flat RCPT list minus the addresses the
    /// headers account for.
    pub recipients_bcc: Vec<Address>,
    /// Decoded Subject header, if present.
    pub subject: Option<String>,
    /// First text/plain body part, if present.
    pub body_plain: Option<String>,
    /// First text/html body part, if present.
    pub body_html: Option<String>,
    /// Raw DATA payload size in bytes, excluding the terminator line.
    pub size_bytes: usize,
    /// Completion timestamp.
    pub received_at: DateTime<Utc>,
    /// Transport-level origin, for diagnostics only.
    pub peer: SocketAddr,
}

/// Envelope under construction, owned by one session.
///
/// Created when MAIL FROM is accepted, discarded on RSET or abort,
/// frozen into an [`Envelope`] by [`finish`](Self::finish).
#[derive(Debug)]
pub struct EnvelopeBuilder {
    sender: Address,
    recipients: Vec<Address>,
    lines: Vec<String>,
    guard: SizeGuard,
}

impl EnvelopeBuilder {
    /// Starts a new envelope for `sender` with the given size ceiling.
    #[must_use]
    pub const fn new(sender: Address, size_ceiling: usize) -> Self {
        Self {
            sender,
            recipients: Vec::new(),
            lines: Vec::new(),
            guard: SizeGuard::new(size_ceiling),
        }
    }

    /// Appends a recipient from RCPT TO.
    pub fn add_recipient(&mut self, address: Address) {
        self.recipients.push(address);
    }

    /// Number of recipients recorded so far.
    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.recipients.len()
    }

    /// Consumes one DATA line (CRLF already stripped).
    ///
    /// The raw line length plus CRLF counts toward the size ceiling.
    /// Returns `false` once the ceiling is crossed; lines past that
    /// point are counted but no longer stored.
    pub fn push_data_line(&mut self, raw_line: &str) -> bool {
        let within = self.guard.record(raw_line.len() + 2);
        if within {
            // Dot-transparency: a leading dot was doubled by the client.
            let line = raw_line.strip_prefix('.').unwrap_or(raw_line);
            self.lines.push(line.to_string());
        }
        within
    }

    /// True once the DATA payload has crossed the size ceiling.
    #[must_use]
    pub const fn size_exceeded(&self) -> bool {
        self.guard.is_exceeded()
    }

    /// Freezes the builder into an [`Envelope`].
    ///
    /// Parses the accumulated payload as a MIME message, extracts the
    /// subject and first plain/HTML bodies, and classifies the flat
    /// recipient list against the To and Cc headers. A payload that
    /// fails to parse still produces an envelope; its recipients all
    /// land in bcc and the raw text becomes the plain body.
    #[must_use]
    pub fn finish(self, peer: SocketAddr) -> Envelope {
        let raw = self.lines.join("\r\n");
        let size_bytes = self.guard.total();

        let (subject, body_plain, body_html, header_to, header_cc) = match Message::parse(&raw) {
            Ok(message) => {
                let header_to = collect_addresses(&message.headers, "to");
                let header_cc = collect_addresses(&message.headers, "cc");

                let mut body_plain = message.text_part().map(Part::body_text);
                let body_html = message.html_part().map(Part::body_text);
                if body_plain.is_none() && body_html.is_none() {
                    // Unknown content type, keep something readable.
                    body_plain = message.parts.first().map(Part::body_text);
                }

                (message.subject(), body_plain, body_html, header_to, header_cc)
            }
            Err(err) => {
                tracing::warn!(error = %err, "message body failed to parse, storing raw");
                (None, Some(raw), None, Vec::new(), Vec::new())
            }
        };

        let mut recipients_to = Vec::new();
        let mut recipients_cc = Vec::new();
        let mut recipients_bcc = Vec::new();
        for rcpt in &self.recipients {
            if header_to.iter().any(|a| rcpt.matches(a)) {
                recipients_to.push(rcpt.clone());
            } else if header_cc.iter().any(|a| rcpt.matches(a)) {
                recipients_cc.push(rcpt.clone());
            } else {
                recipients_bcc.push(rcpt.clone());
            }
        }

        Envelope {
            sender: self.sender,
            recipients: self.recipients,
            recipients_to,
            recipients_cc,
            recipients_bcc,
            subject,
            body_plain,
            body_html,
            size_bytes,
            received_at: Utc::now(),
            peer,
        }
    }
}

/// Collects every address named in the given header, across repeats.
fn collect_addresses(headers: &Headers, name: &str) -> Vec<String> {
    headers
        .get_all(name)
        .into_iter()
        .flat_map(maildock_mime::address::parse_address_list)
        .collect()
}
