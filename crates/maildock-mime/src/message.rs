//! MIME message parsing.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// A leaf part of a parsed message.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body, still transfer-encoded.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Gets the content type, defaulting to text/plain.
    ///
    /// # Errors
    ///
    /// Returns an error if the Content-Type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// True if the part is marked as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("content-disposition")
            .is_some_and(|d| d.trim().to_lowercase().starts_with("attachment"))
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => {
                let body_str = String::from_utf8_lossy(&self.body);
                // Lenient: strip line breaks before decoding
                let cleaned: String = body_str.chars().filter(|c| !c.is_whitespace()).collect();
                decode_base64(&cleaned)
            }
            TransferEncoding::QuotedPrintable => {
                let body_str = String::from_utf8_lossy(&self.body);
                let decoded = decode_quoted_printable(&body_str)?;
                Ok(decoded.into_bytes())
            }
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as text.
    ///
    /// Falls back to the raw bytes if transfer decoding fails and to a
    /// lossy conversion if the bytes are not valid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> String {
        let decoded = self
            .decode_body()
            .unwrap_or_else(|_| self.body.clone());
        String::from_utf8_lossy(&decoded).into_owned()
    }
}

/// A parsed message: top-level headers plus its leaf parts.
///
/// Nested multiparts are flattened; only leaf parts are kept, in
/// document order.
#[derive(Debug, Clone)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Leaf parts. A single-part message has exactly one.
    pub parts: Vec<Part>,
}

impl Message {
    /// Parses a raw message (header block, blank line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart body is declared without a
    /// boundary parameter.
    pub fn parse(raw: &str) -> Result<Self> {
        let (header_text, body) = split_header_body(raw);
        let headers = Headers::parse(header_text)?;

        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        let mut parts = Vec::new();
        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            collect_parts(body, boundary, &mut parts)?;
        } else {
            parts.push(Part::new(
                copy_content_headers(&headers),
                body.as_bytes().to_vec(),
            ));
        }

        Ok(Self { headers, parts })
    }

    /// Gets the content type, defaulting to text/plain.
    ///
    /// # Errors
    ///
    /// Returns an error if the Content-Type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the Subject header with RFC 2047 words decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get_decoded("subject")
    }

    /// First text/plain leaf part that is not an attachment.
    #[must_use]
    pub fn text_part(&self) -> Option<&Part> {
        self.find_part("text", "plain")
    }

    /// First text/html leaf part that is not an attachment.
    #[must_use]
    pub fn html_part(&self) -> Option<&Part> {
        self.find_part("text", "html")
    }

    fn find_part(&self, main_type: &str, sub_type: &str) -> Option<&Part> {
        self.parts.iter().find(|part| {
            !part.is_attachment()
                && part
                    .content_type()
                    .is_ok_and(|ct| ct.is(main_type, sub_type))
        })
    }
}

/// Splits raw message text at the first blank line.
///
/// Without a blank-line separator the text is all headers only if its
/// first line actually is one; otherwise the whole input is body.
fn split_header_body(raw: &str) -> (&str, &str) {
    if let Some(idx) = raw.find("\r\n\r\n") {
        return (&raw[..idx], &raw[idx + 4..]);
    }
    if let Some(idx) = raw.find("\n\n") {
        return (&raw[..idx], &raw[idx + 2..]);
    }
    if starts_with_header(raw) {
        (raw, "")
    } else {
        ("", raw)
    }
}

/// True if the first line has the `Name: value` shape.
fn starts_with_header(raw: &str) -> bool {
    let first = raw.lines().next().unwrap_or("");
    first.find(':').is_some_and(|idx| {
        let name = &first[..idx];
        !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic())
    })
}

/// Splits a multipart body on its boundary and appends the leaf parts,
/// recursing into nested multiparts.
fn collect_parts(body: &str, boundary: &str, out: &mut Vec<Part>) -> Result<()> {
    let delimiter = format!("--{boundary}");
    let mut sections = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in body.lines() {
        let trimmed = line.trim_end();
        if trimmed == delimiter {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some(Vec::new());
        } else if trimmed == format!("{delimiter}--") {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            break;
        } else if let Some(section) = current.as_mut() {
            section.push(line);
        }
    }
    if let Some(section) = current.take() {
        sections.push(section);
    }

    for section in sections {
        let text = section.join("\r\n");
        let (header_text, part_body) = split_header_body(&text);
        let headers = Headers::parse(header_text)?;

        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        if content_type.is_multipart() {
            let inner = content_type.boundary().ok_or(Error::MissingBoundary)?;
            // Clone keeps the borrow local while recursing.
            let inner = inner.to_string();
            collect_parts(part_body, &inner, out)?;
        } else {
            out.push(Part::new(headers, part_body.as_bytes().to_vec()));
        }
    }

    Ok(())
}

/// Copies the Content-* headers into the synthetic part of a
/// single-part message.
fn copy_content_headers(headers: &Headers) -> Headers {
    let mut part_headers = Headers::new();
    for name in ["content-type", "content-transfer-encoding", "content-disposition"] {
        if let Some(value) = headers.get(name) {
            part_headers.add(name, value);
        }
    }
    part_headers
}
