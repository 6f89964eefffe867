//! Decoding of MIME transfer encodings.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Quoted-Printable text (RFC 2045).
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let mut result = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '=' {
            // Soft line break
            if chars.peek() == Some(&'\r') {
                chars.next(); // consume \r
                if chars.peek() == Some(&'\n') {
                    chars.next(); // consume \n
                    continue;
                }
            } else if chars.peek() == Some(&'\n') {
                chars.next(); // consume \n
                continue;
            }

            // Hex encoded byte
            let hex: String = chars.by_ref().take(2).collect();
            if hex.len() == 2 {
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
            } else {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        } else {
            let mut buf = [0u8; 4];
            result.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    String::from_utf8(result).map_err(Into::into)
}

/// Decodes an RFC 2047 encoded header value.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// Plain text passes through unchanged.
///
/// # Errors
///
/// Returns an error if the encoded word is malformed or uses an
/// unknown encoding.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    if !text.starts_with("=?") || !text.ends_with("?=") {
        return Ok(text.to_string());
    }

    let inner = &text[2..text.len() - 2];
    let parts: Vec<&str> = inner.split('?').collect();

    if parts.len() != 3 {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    }

    let encoding = parts[1].to_uppercase();
    let encoded_text = parts[2];

    match encoding.as_str() {
        "B" => {
            let decoded = decode_base64(encoded_text)?;
            String::from_utf8(decoded).map_err(Into::into)
        }
        "Q" => {
            // Q encoding uses underscore for space
            let text_with_spaces = encoded_text.replace('_', " ");
            decode_quoted_printable(&text_with_spaces)
        }
        _ => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {encoding}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode() {
        let decoded = decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("not base64!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("Hello, World!").unwrap();
        assert_eq!(decoded, "Hello, World!");

        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_quoted_printable_passes_through_raw_utf8() {
        // Lenient 8-bit input: literal non-ASCII stays intact.
        let decoded = decode_quoted_printable("d\u{e9}j\u{e0}=20vu").unwrap();
        assert_eq!(decoded, "déjà vu");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_quoted_printable_incomplete_escape() {
        assert!(decode_quoted_printable("broken=4").is_err());
    }

    #[test]
    fn test_rfc2047_decode() {
        let decoded = decode_rfc2047("Hello").unwrap();
        assert_eq!(decoded, "Hello");

        let decoded = decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        let decoded = decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }
}
