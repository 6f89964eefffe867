//! The per-connection SMTP session state machine.
//!
//! A [`Session`] owns one connection's protocol state. It never touches
//! the network itself: the supervisor feeds it input lines and executes
//! the returned [`Action`]s, which keeps every transition synchronous
//! and directly testable.

use crate::auth::{
    self, AuthMechanism, Credentials, LOGIN_PASSWORD_CHALLENGE, LOGIN_USERNAME_CHALLENGE,
};
use crate::types::{Command, Envelope, EnvelopeBuilder, ParseError, Reply, ReplyCode};
use std::net::SocketAddr;
use std::sync::Arc;

/// Consecutive failed AUTH attempts before the connection is closed.
const MAX_AUTH_FAILURES: u8 = 3;

/// Consecutive rejected commands before the connection is closed.
const MAX_CONSECUTIVE_ERRORS: u8 = 10;

/// Immutable per-server policy shared by all sessions.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Hostname used in the greeting and EHLO replies.
    pub hostname: String,
    /// Maximum DATA payload size in bytes.
    pub size_ceiling: usize,
    /// Whether STARTTLS is offered.
    pub tls_available: bool,
    /// Whether commands other than EHLO/HELO/STARTTLS/NOOP/QUIT are
    /// refused until TLS is active.
    pub require_tls: bool,
    /// Configured credentials; authentication is required for MAIL
    /// exactly when this is set.
    pub credentials: Option<Credentials>,
}

impl SessionPolicy {
    const fn auth_enabled(&self) -> bool {
        self.credentials.is_some()
    }
}

/// What the supervisor must do after feeding the session a line.
#[derive(Debug)]
pub enum Action {
    /// Line consumed, nothing to send (DATA collection).
    Continue,
    /// Send the reply and keep reading.
    Reply(Reply),
    /// Send the reply, then close the connection.
    ReplyThenClose(Reply),
    /// Send the reply, then perform the TLS handshake and call
    /// [`Session::tls_established`] on success.
    UpgradeTls(Reply),
    /// Send the reply and hand the finished envelope to the sink.
    Accepted(Reply, Box<Envelope>),
}

/// Protocol state reached by accepted commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Transport open, no greeting-response exchange yet.
    Connected,
    /// EHLO/HELO accepted, no transaction open.
    Greeted,
    /// MAIL FROM accepted, waiting for recipients.
    MailFrom,
    /// At least one RCPT TO accepted, DATA now allowed.
    RcptTo,
}

/// What kind of input the next line is.
#[derive(Debug)]
enum Phase {
    /// Regular command lines.
    Command,
    /// Raw DATA lines until the `.` terminator.
    Data,
    /// Continuation of an AUTH exchange.
    Auth(AuthDialog),
}

#[derive(Debug)]
enum AuthDialog {
    /// AUTH PLAIN sent without an initial response.
    PlainPayload,
    /// AUTH LOGIN, waiting for the username line.
    LoginUsername,
    /// AUTH LOGIN, waiting for the password line.
    LoginPassword {
        /// Decoded username from the previous line.
        username: String,
    },
}

/// One connection's SMTP state machine.
#[derive(Debug)]
pub struct Session {
    policy: Arc<SessionPolicy>,
    peer: SocketAddr,
    state: State,
    phase: Phase,
    tls_active: bool,
    authenticated: bool,
    auth_failures: u8,
    consecutive_errors: u8,
    envelope: Option<EnvelopeBuilder>,
}

impl Session {
    /// Creates a session for a freshly accepted connection.
    #[must_use]
    pub const fn new(policy: Arc<SessionPolicy>, peer: SocketAddr) -> Self {
        Self {
            policy,
            peer,
            state: State::Connected,
            phase: Phase::Command,
            tls_active: false,
            authenticated: false,
            auth_failures: 0,
            consecutive_errors: 0,
            envelope: None,
        }
    }

    /// The 220 banner sent on connect.
    #[must_use]
    pub fn greeting(&self) -> Reply {
        let hostname = &self.policy.hostname;
        Reply::single(
            ReplyCode::SERVICE_READY,
            format!("{hostname} ESMTP service ready"),
        )
    }

    /// True once STARTTLS has completed on this connection.
    #[must_use]
    pub const fn is_tls_active(&self) -> bool {
        self.tls_active
    }

    /// True once AUTH has succeeded on this connection.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Marks the TLS handshake complete.
    ///
    /// The protocol state resets to its just-connected shape: anything
    /// negotiated in plaintext (greeting, authentication, an open
    /// envelope) is forgotten and a fresh EHLO is required.
    pub fn tls_established(&mut self) {
        self.tls_active = true;
        self.authenticated = false;
        self.state = State::Connected;
        self.phase = Phase::Command;
        self.envelope = None;
    }

    /// Handles an input line that exceeded the line-length ceiling.
    ///
    /// During DATA there is no way to resynchronize with the sender, so
    /// the connection closes; otherwise the command is rejected and the
    /// dialog continues.
    pub fn line_too_long(&mut self) -> Action {
        if matches!(self.phase, Phase::Data) {
            self.envelope = None;
            return Action::ReplyThenClose(Reply::single(
                ReplyCode::SYNTAX_ERROR,
                "Line too long, closing connection",
            ));
        }
        self.fail(Reply::single(ReplyCode::SYNTAX_ERROR, "Line too long"))
    }

    /// Feeds one input line (CRLF already stripped) to the machine.
    pub fn handle_line(&mut self, line: &str) -> Action {
        match &self.phase {
            Phase::Data => self.handle_data_line(line),
            Phase::Auth(_) => self.handle_auth_line(line),
            Phase::Command => match Command::parse(line) {
                Ok(command) => self.handle_command(command),
                Err(ParseError::UnknownCommand(verb)) => self.fail(Reply::single(
                    ReplyCode::SYNTAX_ERROR,
                    format!("Command not recognized: {verb}"),
                )),
                Err(ParseError::InvalidParameters(message)) => {
                    self.fail(Reply::single(ReplyCode::PARAMETER_ERROR, message))
                }
            },
        }
    }

    fn handle_command(&mut self, command: Command) -> Action {
        if let Some(action) = self.enforce_tls_policy(&command) {
            return action;
        }

        match command {
            Command::Ehlo(domain) => self.on_ehlo(&domain),
            Command::Helo(domain) => self.on_helo(&domain),
            Command::StartTls => self.on_starttls(),
            Command::Auth { mechanism, initial } => self.on_auth(&mechanism, initial.as_deref()),
            Command::MailFrom { address, size } => self.on_mail(address, size),
            Command::RcptTo(address) => self.on_rcpt(address),
            Command::Data => self.on_data(),
            Command::Rset => self.on_rset(),
            Command::Noop => self.accept(Reply::single(ReplyCode::OK, "OK")),
            Command::Quit => {
                Action::ReplyThenClose(Reply::single(ReplyCode::CLOSING, "Bye"))
            }
        }
    }

    /// Under mandatory TLS, plaintext commands beyond the handshake set
    /// are refused.
    fn enforce_tls_policy(&mut self, command: &Command) -> Option<Action> {
        if self.tls_active || !self.policy.require_tls {
            return None;
        }

        match command {
            Command::Ehlo(_)
            | Command::Helo(_)
            | Command::StartTls
            | Command::Noop
            | Command::Quit => None,
            Command::Auth { .. } => Some(self.fail(Reply::single(
                ReplyCode::ENCRYPTION_REQUIRED,
                "Encryption required for requested authentication mechanism",
            ))),
            _ => Some(self.fail(Reply::single(
                ReplyCode::AUTH_REQUIRED,
                "Must issue a STARTTLS command first",
            ))),
        }
    }

    fn on_ehlo(&mut self, domain: &str) -> Action {
        // EHLO aborts any transaction in progress.
        self.envelope = None;
        self.state = State::Greeted;

        let hostname = &self.policy.hostname;
        let ceiling = self.policy.size_ceiling;
        let mut lines = vec![format!("{hostname} greets {domain}"), format!("SIZE {ceiling}")];
        if self.policy.tls_available && !self.tls_active {
            lines.push("STARTTLS".to_string());
        }
        if self.policy.auth_enabled() && !self.authenticated {
            lines.push(AuthMechanism::advertisement().to_string());
        }

        self.accept(Reply::new(ReplyCode::OK, lines))
    }

    fn on_helo(&mut self, _domain: &str) -> Action {
        self.envelope = None;
        self.state = State::Greeted;
        self.accept(Reply::single(
            ReplyCode::OK,
            self.policy.hostname.clone(),
        ))
    }

    fn on_starttls(&mut self) -> Action {
        if !self.policy.tls_available {
            return self.fail(Reply::single(
                ReplyCode::TLS_UNAVAILABLE,
                "TLS not available",
            ));
        }
        if self.tls_active {
            return self.fail(Reply::single(
                ReplyCode::BAD_SEQUENCE,
                "TLS already active",
            ));
        }

        self.consecutive_errors = 0;
        Action::UpgradeTls(Reply::single(
            ReplyCode::SERVICE_READY,
            "Ready to start TLS",
        ))
    }

    fn on_auth(&mut self, mechanism: &str, initial: Option<&str>) -> Action {
        if !self.policy.auth_enabled() {
            return self.fail(Reply::single(
                ReplyCode::NOT_IMPLEMENTED,
                "Authentication not enabled",
            ));
        }
        if self.authenticated {
            return self.fail(Reply::single(
                ReplyCode::BAD_SEQUENCE,
                "Already authenticated",
            ));
        }
        if self.state == State::Connected {
            return self.fail(Reply::single(
                ReplyCode::BAD_SEQUENCE,
                "Send EHLO first",
            ));
        }
        if self.envelope.is_some() {
            return self.fail(Reply::single(
                ReplyCode::BAD_SEQUENCE,
                "AUTH not permitted during a mail transaction",
            ));
        }

        match AuthMechanism::parse(mechanism) {
            Some(AuthMechanism::Plain) => match initial {
                Some(payload) => self.verify_plain(payload),
                None => {
                    self.phase = Phase::Auth(AuthDialog::PlainPayload);
                    Action::Reply(Reply::new(ReplyCode::AUTH_CONTINUE, vec![]))
                }
            },
            Some(AuthMechanism::Login) => match initial {
                Some(payload) => match auth::decode_login_field(payload) {
                    Some(username) => {
                        self.phase = Phase::Auth(AuthDialog::LoginPassword { username });
                        Action::Reply(Reply::single(
                            ReplyCode::AUTH_CONTINUE,
                            LOGIN_PASSWORD_CHALLENGE,
                        ))
                    }
                    None => self.auth_failure(),
                },
                None => {
                    self.phase = Phase::Auth(AuthDialog::LoginUsername);
                    Action::Reply(Reply::single(
                        ReplyCode::AUTH_CONTINUE,
                        LOGIN_USERNAME_CHALLENGE,
                    ))
                }
            },
            None => self.fail(Reply::single(
                ReplyCode::PARAMETER_NOT_IMPLEMENTED,
                format!("Unrecognized authentication type: {mechanism}"),
            )),
        }
    }

    fn handle_auth_line(&mut self, line: &str) -> Action {
        let dialog = match std::mem::replace(&mut self.phase, Phase::Command) {
            Phase::Auth(dialog) => dialog,
            // handle_line only routes here from the Auth phase
            other => {
                self.phase = other;
                return Action::Continue;
            }
        };

        if line.trim() == "*" {
            return self.fail(Reply::single(
                ReplyCode::PARAMETER_ERROR,
                "Authentication cancelled",
            ));
        }

        match dialog {
            AuthDialog::PlainPayload => self.verify_plain(line),
            AuthDialog::LoginUsername => match auth::decode_login_field(line) {
                Some(username) => {
                    self.phase = Phase::Auth(AuthDialog::LoginPassword { username });
                    Action::Reply(Reply::single(
                        ReplyCode::AUTH_CONTINUE,
                        LOGIN_PASSWORD_CHALLENGE,
                    ))
                }
                None => self.auth_failure(),
            },
            AuthDialog::LoginPassword { username } => match auth::decode_login_field(line) {
                Some(password) => self.verify_credentials(&username, &password),
                None => self.auth_failure(),
            },
        }
    }

    fn verify_plain(&mut self, payload: &str) -> Action {
        match auth::decode_plain(payload) {
            Some((username, password)) => self.verify_credentials(&username, &password),
            None => self.auth_failure(),
        }
    }

    fn verify_credentials(&mut self, username: &str, password: &str) -> Action {
        self.phase = Phase::Command;
        let accepted = self
            .policy
            .credentials
            .as_ref()
            .is_some_and(|creds| creds.verify(username, password));

        if accepted {
            self.authenticated = true;
            self.auth_failures = 0;
            tracing::info!(peer = %self.peer, username, "authentication succeeded");
            self.accept(Reply::single(
                ReplyCode::AUTH_SUCCESS,
                "Authentication successful",
            ))
        } else {
            tracing::warn!(peer = %self.peer, username, "authentication failed");
            self.auth_failure()
        }
    }

    fn auth_failure(&mut self) -> Action {
        self.phase = Phase::Command;
        self.auth_failures += 1;
        if self.auth_failures >= MAX_AUTH_FAILURES {
            return Action::ReplyThenClose(Reply::single(
                ReplyCode::AUTH_FAILED,
                "Too many failed authentication attempts",
            ));
        }
        self.fail(Reply::single(
            ReplyCode::AUTH_FAILED,
            "Authentication credentials invalid",
        ))
    }

    fn on_mail(&mut self, address: crate::types::Address, declared_size: Option<usize>) -> Action {
        if self.state == State::Connected {
            return self.fail(Reply::single(
                ReplyCode::BAD_SEQUENCE,
                "Send EHLO/HELO first",
            ));
        }
        if self.envelope.is_some() {
            return self.fail(Reply::single(
                ReplyCode::BAD_SEQUENCE,
                "Nested MAIL command, RSET first",
            ));
        }
        if self.policy.auth_enabled() && !self.authenticated {
            return self.fail(Reply::single(
                ReplyCode::AUTH_REQUIRED,
                "Authentication required",
            ));
        }
        if declared_size.is_some_and(|size| size > self.policy.size_ceiling) {
            return self.fail(Reply::single(
                ReplyCode::EXCEEDED_STORAGE,
                "Message size exceeds fixed maximum",
            ));
        }

        self.envelope = Some(EnvelopeBuilder::new(address, self.policy.size_ceiling));
        self.state = State::MailFrom;
        self.accept(Reply::single(ReplyCode::OK, "OK"))
    }

    fn on_rcpt(&mut self, address: crate::types::Address) -> Action {
        let Some(envelope) = self.envelope.as_mut() else {
            return self.fail(Reply::single(ReplyCode::BAD_SEQUENCE, "Need MAIL command"));
        };

        envelope.add_recipient(address);
        self.state = State::RcptTo;
        self.accept(Reply::single(ReplyCode::OK, "OK"))
    }

    fn on_data(&mut self) -> Action {
        if self.state != State::RcptTo {
            let reply = if self.envelope.is_some() {
                Reply::single(ReplyCode::BAD_SEQUENCE, "Need RCPT command")
            } else {
                Reply::single(ReplyCode::BAD_SEQUENCE, "Need MAIL command")
            };
            return self.fail(reply);
        }

        self.phase = Phase::Data;
        self.consecutive_errors = 0;
        Action::Reply(Reply::single(
            ReplyCode::START_DATA,
            "End data with <CR><LF>.<CR><LF>",
        ))
    }

    fn handle_data_line(&mut self, line: &str) -> Action {
        if line != "." {
            if let Some(envelope) = self.envelope.as_mut() {
                envelope.push_data_line(line);
            }
            return Action::Continue;
        }

        // Terminator: the transaction ends here either way.
        self.phase = Phase::Command;
        self.state = State::Greeted;
        let Some(envelope) = self.envelope.take() else {
            return self.fail(Reply::single(ReplyCode::LOCAL_ERROR, "No transaction"));
        };

        if envelope.size_exceeded() {
            tracing::warn!(peer = %self.peer, "message discarded, size ceiling exceeded");
            return self.fail(Reply::single(
                ReplyCode::EXCEEDED_STORAGE,
                "Message size exceeds fixed maximum",
            ));
        }

        let envelope = envelope.finish(self.peer);
        tracing::info!(
            peer = %self.peer,
            sender = %envelope.sender,
            recipients = envelope.recipients.len(),
            size_bytes = envelope.size_bytes,
            "message accepted"
        );
        self.consecutive_errors = 0;
        Action::Accepted(
            Reply::single(ReplyCode::OK, "OK: message accepted"),
            Box::new(envelope),
        )
    }

    fn on_rset(&mut self) -> Action {
        self.envelope = None;
        if self.state != State::Connected {
            self.state = State::Greeted;
        }
        self.accept(Reply::single(ReplyCode::OK, "OK"))
    }

    fn accept(&mut self, reply: Reply) -> Action {
        self.consecutive_errors = 0;
        Action::Reply(reply)
    }

    fn fail(&mut self, reply: Reply) -> Action {
        self.consecutive_errors += 1;
        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            return Action::ReplyThenClose(Reply::single(
                ReplyCode::SERVICE_UNAVAILABLE,
                "Too many errors, closing connection",
            ));
        }
        Action::Reply(reply)
    }
}
