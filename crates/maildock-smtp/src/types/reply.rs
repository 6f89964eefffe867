//! SMTP reply types.

/// SMTP reply sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Creates a single-line reply.
    #[must_use]
    pub fn single(code: ReplyCode, text: impl Into<String>) -> Self {
        Self {
            code,
            message: vec![text.into()],
        }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is an error reply (4xx or 5xx).
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.code.is_transient() || self.code.is_permanent()
    }

    /// Renders the reply for the wire.
    ///
    /// Multiline replies use the `code-text` continuation form on every
    /// line but the last, which uses `code text`. Lines are CRLF
    /// terminated.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let code = self.code;
        if self.message.is_empty() {
            return format!("{code} \r\n");
        }

        let mut out = String::new();
        let last = self.message.len() - 1;
        for (i, line) in self.message.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            out.push_str(&format!("{code}{sep}{line}\r\n"));
        }
        out
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Reply codes the engine emits
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication successful
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 454 TLS not available due to temporary reason
    pub const TLS_UNAVAILABLE: Self = Self(454);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Syntax error in parameters or arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 504 Command parameter not implemented
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// 530 Authentication required
    pub const AUTH_REQUIRED: Self = Self(530);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 538 Encryption required for requested authentication mechanism
    pub const ENCRYPTION_REQUIRED: Self = Self(538);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn success_codes() {
            assert!(ReplyCode::OK.is_success());
            assert!(ReplyCode::SERVICE_READY.is_success());
            assert!(ReplyCode::CLOSING.is_success());
            assert!(ReplyCode::AUTH_SUCCESS.is_success());
        }

        #[test]
        fn intermediate_codes() {
            assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
            assert!(ReplyCode::START_DATA.is_intermediate());
        }

        #[test]
        fn transient_errors() {
            assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
            assert!(ReplyCode::LOCAL_ERROR.is_transient());
            assert!(ReplyCode::TLS_UNAVAILABLE.is_transient());
        }

        #[test]
        fn permanent_errors() {
            assert!(ReplyCode::SYNTAX_ERROR.is_permanent());
            assert!(ReplyCode::PARAMETER_ERROR.is_permanent());
            assert!(ReplyCode::NOT_IMPLEMENTED.is_permanent());
            assert!(ReplyCode::BAD_SEQUENCE.is_permanent());
            assert!(ReplyCode::AUTH_FAILED.is_permanent());
            assert!(ReplyCode::EXCEEDED_STORAGE.is_permanent());
        }

        #[test]
        fn as_u16() {
            assert_eq!(ReplyCode::OK.as_u16(), 250);
            assert_eq!(ReplyCode::SERVICE_READY.as_u16(), 220);
            assert_eq!(ReplyCode::AUTH_FAILED.as_u16(), 535);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ReplyCode::OK), "250");
            assert_eq!(format!("{}", ReplyCode::SYNTAX_ERROR), "500");
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn single_line_wire_format() {
            let reply = Reply::single(ReplyCode::OK, "OK");
            assert_eq!(reply.to_wire(), "250 OK\r\n");
        }

        #[test]
        fn multiline_wire_format() {
            let reply = Reply::new(
                ReplyCode::OK,
                vec![
                    "mail.example.com".to_string(),
                    "SIZE 26214400".to_string(),
                    "STARTTLS".to_string(),
                ],
            );
            assert_eq!(
                reply.to_wire(),
                "250-mail.example.com\r\n250-SIZE 26214400\r\n250 STARTTLS\r\n"
            );
        }

        #[test]
        fn empty_message_wire_format() {
            let reply = Reply::new(ReplyCode::AUTH_CONTINUE, vec![]);
            assert_eq!(reply.to_wire(), "334 \r\n");
        }

        #[test]
        fn is_error() {
            assert!(Reply::single(ReplyCode::BAD_SEQUENCE, "Bad sequence").is_error());
            assert!(!Reply::single(ReplyCode::OK, "OK").is_error());
            assert!(!Reply::single(ReplyCode::START_DATA, "Go").is_error());
        }
    }
}
