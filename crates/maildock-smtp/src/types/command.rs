//! SMTP command parsing.

use crate::types::Address;

/// A parsed SMTP command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO with client hostname.
    Helo(String),
    /// EHLO with client hostname.
    Ehlo(String),
    /// MAIL FROM with sender address and optional SIZE parameter.
    MailFrom {
        /// Sender mailbox address.
        address: Address,
        /// Declared message size from the SIZE extension, if given.
        size: Option<usize>,
    },
    /// RCPT TO with recipient address.
    RcptTo(Address),
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// NOOP.
    Noop,
    /// QUIT.
    Quit,
    /// STARTTLS.
    StartTls,
    /// AUTH with mechanism name and optional initial response.
    Auth {
        /// Mechanism name as sent (e.g., "PLAIN", "LOGIN").
        mechanism: String,
        /// Base64 initial response, if sent on the command line.
        initial: Option<String>,
    },
}

/// Why a command line failed to parse.
///
/// The two variants map to the 500 and 501 reply families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The verb is not one this server implements.
    UnknownCommand(String),
    /// The verb was recognized but its arguments are malformed.
    InvalidParameters(String),
}

impl Command {
    /// Parses a single command line (CRLF already stripped).
    ///
    /// Verbs are matched case-insensitively per RFC 5321 §2.4.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnknownCommand`] for unrecognized verbs and
    /// [`ParseError::InvalidParameters`] for malformed arguments.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(v, r)| (v, r.trim()));

        match verb.to_ascii_uppercase().as_str() {
            "HELO" => {
                if rest.is_empty() {
                    return Err(ParseError::InvalidParameters(
                        "Syntax: HELO hostname".into(),
                    ));
                }
                Ok(Self::Helo(rest.to_string()))
            }
            "EHLO" => {
                if rest.is_empty() {
                    return Err(ParseError::InvalidParameters(
                        "Syntax: EHLO hostname".into(),
                    ));
                }
                Ok(Self::Ehlo(rest.to_string()))
            }
            "MAIL" => parse_mail(rest),
            "RCPT" => parse_rcpt(rest),
            "DATA" => Ok(Self::Data),
            "RSET" => Ok(Self::Rset),
            "NOOP" => Ok(Self::Noop),
            "QUIT" => Ok(Self::Quit),
            "STARTTLS" => Ok(Self::StartTls),
            "AUTH" => parse_auth(rest),
            _ => Err(ParseError::UnknownCommand(verb.to_string())),
        }
    }
}

fn parse_mail(rest: &str) -> Result<Command, ParseError> {
    let args = strip_path_keyword(rest, "FROM:")
        .ok_or_else(|| ParseError::InvalidParameters("Syntax: MAIL FROM:<address>".into()))?;

    let (path, params) = split_path(args);
    let address = parse_path_address(path)?;

    let mut size = None;
    for param in params.split_whitespace() {
        if let Some(value) = param
            .strip_prefix("SIZE=")
            .or_else(|| param.strip_prefix("size="))
        {
            size = Some(value.parse::<usize>().map_err(|_| {
                ParseError::InvalidParameters(format!("Invalid SIZE value: {value}"))
            })?);
        }
        // Other ESMTP parameters are tolerated and ignored.
    }

    Ok(Command::MailFrom { address, size })
}

fn parse_rcpt(rest: &str) -> Result<Command, ParseError> {
    let args = strip_path_keyword(rest, "TO:")
        .ok_or_else(|| ParseError::InvalidParameters("Syntax: RCPT TO:<address>".into()))?;

    let (path, _params) = split_path(args);
    let address = parse_path_address(path)?;
    Ok(Command::RcptTo(address))
}

fn parse_auth(rest: &str) -> Result<Command, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::InvalidParameters(
            "Syntax: AUTH mechanism [initial-response]".into(),
        ));
    }

    let mut parts = rest.split_whitespace();
    let mechanism = parts.next().unwrap_or_default().to_string();
    let initial = parts.next().map(ToString::to_string);

    Ok(Command::Auth { mechanism, initial })
}

/// Strips a `FROM:`/`TO:` keyword, case-insensitively.
fn strip_path_keyword<'a>(rest: &'a str, keyword: &str) -> Option<&'a str> {
    if rest.len() >= keyword.len() && rest[..keyword.len()].eq_ignore_ascii_case(keyword) {
        Some(rest[keyword.len()..].trim_start())
    } else {
        None
    }
}

/// Splits `<path> params...` into the path and its trailing parameters.
fn split_path(args: &str) -> (&str, &str) {
    if args.starts_with('<') {
        args.find('>').map_or((args, ""), |close| {
            (&args[..=close], args[close + 1..].trim_start())
        })
    } else {
        args.split_once(char::is_whitespace)
            .map_or((args, ""), |(p, rest)| (p, rest.trim_start()))
    }
}

fn parse_path_address(path: &str) -> Result<Address, ParseError> {
    let inner = path
        .strip_prefix('<')
        .and_then(|p| p.strip_suffix('>'))
        .unwrap_or(path)
        .trim();

    Address::new(inner).map_err(|e| ParseError::InvalidParameters(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ehlo() {
        assert_eq!(
            Command::parse("EHLO client.example.com").unwrap(),
            Command::Ehlo("client.example.com".to_string())
        );
    }

    #[test]
    fn test_parse_verb_case_insensitive() {
        assert_eq!(
            Command::parse("ehlo client.example.com").unwrap(),
            Command::Ehlo("client.example.com".to_string())
        );
        assert_eq!(Command::parse("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_ehlo_missing_hostname() {
        assert!(matches!(
            Command::parse("EHLO"),
            Err(ParseError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_parse_mail_from() {
        let cmd = Command::parse("MAIL FROM:<sender@example.com>").unwrap();
        match cmd {
            Command::MailFrom { address, size } => {
                assert_eq!(address.as_str(), "sender@example.com");
                assert!(size.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_mail_from_with_size() {
        let cmd = Command::parse("MAIL FROM:<sender@example.com> SIZE=1024").unwrap();
        match cmd {
            Command::MailFrom { size, .. } => assert_eq!(size, Some(1024)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_mail_from_bad_size() {
        assert!(matches!(
            Command::parse("MAIL FROM:<a@x.com> SIZE=huge"),
            Err(ParseError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_parse_mail_from_without_brackets() {
        let cmd = Command::parse("MAIL FROM:sender@example.com").unwrap();
        match cmd {
            Command::MailFrom { address, .. } => {
                assert_eq!(address.as_str(), "sender@example.com");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_mail_from_invalid_address() {
        assert!(matches!(
            Command::parse("MAIL FROM:<not-an-address>"),
            Err(ParseError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_parse_mail_missing_keyword() {
        assert!(matches!(
            Command::parse("MAIL <a@x.com>"),
            Err(ParseError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_parse_rcpt_to() {
        let cmd = Command::parse("RCPT TO:<rcpt@example.com>").unwrap();
        assert_eq!(
            cmd,
            Command::RcptTo(Address::new("rcpt@example.com").unwrap())
        );
    }

    #[test]
    fn test_parse_rcpt_keyword_case() {
        assert!(Command::parse("rcpt to:<rcpt@example.com>").is_ok());
    }

    #[test]
    fn test_parse_auth_with_initial() {
        let cmd = Command::parse("AUTH PLAIN AGZvbwBiYXI=").unwrap();
        assert_eq!(
            cmd,
            Command::Auth {
                mechanism: "PLAIN".to_string(),
                initial: Some("AGZvbwBiYXI=".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_auth_without_initial() {
        let cmd = Command::parse("AUTH LOGIN").unwrap();
        assert_eq!(
            cmd,
            Command::Auth {
                mechanism: "LOGIN".to_string(),
                initial: None,
            }
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(matches!(
            Command::parse("VRFY user"),
            Err(ParseError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_parse_simple_verbs() {
        assert_eq!(Command::parse("DATA").unwrap(), Command::Data);
        assert_eq!(Command::parse("RSET").unwrap(), Command::Rset);
        assert_eq!(Command::parse("NOOP").unwrap(), Command::Noop);
        assert_eq!(Command::parse("STARTTLS").unwrap(), Command::StartTls);
    }
}
