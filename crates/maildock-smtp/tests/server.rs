//! Integration tests driving a live listener over TCP.

#![allow(clippy::unwrap_used)]

use maildock_smtp::{ChannelSink, Credentials, Envelope, ServerSettings, serve};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};

struct Harness {
    addr: SocketAddr,
    envelopes: mpsc::Receiver<Envelope>,
    shutdown: watch::Sender<bool>,
}

async fn start_server(settings: ServerSettings) -> Harness {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, envelopes) = mpsc::channel(16);
    let (shutdown, shutdown_rx) = watch::channel(false);

    tokio::spawn(serve(
        listener,
        Arc::new(settings),
        ChannelSink::new(tx),
        shutdown_rx,
    ));

    Harness {
        addr,
        envelopes,
        shutdown,
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    /// Connects and consumes the 220 greeting.
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer,
        };
        let greeting = client.read_reply().await;
        assert!(greeting.starts_with("220 "));
        client
    }

    /// Reads one complete reply, following `code-` continuation lines.
    /// Returns the final `code text` line.
    async fn read_reply(&mut self) -> String {
        loop {
            let mut line = String::new();
            let n = self.reader.read_line(&mut line).await.unwrap();
            assert!(n > 0, "connection closed while awaiting reply");
            let line = line.trim_end().to_string();
            if line.as_bytes().get(3) != Some(&b'-') {
                return line;
            }
        }
    }

    /// Reads every line of one reply, continuations included.
    async fn read_reply_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            self.reader.read_line(&mut line).await.unwrap();
            let line = line.trim_end().to_string();
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);
            if last {
                return lines;
            }
        }
    }

    async fn send(&mut self, line: &str) -> String {
        self.write_line(line).await;
        self.read_reply().await
    }

    async fn write_line(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
    }

    /// True once the server has closed its side.
    async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap() == 0
    }
}

fn settings() -> ServerSettings {
    ServerSettings::new("mail.test.example")
}

#[tokio::test]
async fn full_transaction_delivers_envelope() {
    let mut harness = start_server(settings()).await;
    let mut client = Client::connect(harness.addr).await;

    assert!(client.send("EHLO x").await.starts_with("250 "));
    assert!(client.send("MAIL FROM:<a@x.com>").await.starts_with("250 "));
    assert!(client.send("RCPT TO:<b@x.com>").await.starts_with("250 "));
    assert!(client.send("DATA").await.starts_with("354 "));

    for line in ["Subject: Hi", "To: b@x.com", "", "Hello"] {
        client.write_line(line).await;
    }
    assert!(client.send(".").await.starts_with("250 "));
    assert!(client.send("QUIT").await.starts_with("221 "));

    let envelope = harness.envelopes.recv().await.unwrap();
    assert_eq!(envelope.sender.as_str(), "a@x.com");
    assert_eq!(envelope.recipients.len(), 1);
    assert_eq!(envelope.recipients[0].as_str(), "b@x.com");
    assert_eq!(envelope.subject.as_deref(), Some("Hi"));
    assert_eq!(envelope.body_plain.as_deref(), Some("Hello"));
}

#[tokio::test]
async fn to_cc_classification_and_exact_size() {
    let mut harness = start_server(settings()).await;
    let mut client = Client::connect(harness.addr).await;

    client.send("EHLO x").await;
    client.send("MAIL FROM:<a@x.com>").await;
    client.send("RCPT TO:<b@x.com>").await;
    client.send("RCPT TO:<c@x.com>").await;
    client.send("RCPT TO:<d@x.com>").await;
    client.send("DATA").await;

    let body = [
        "Subject: Hi",
        "From: a@x.com",
        "To: b@x.com",
        "Cc: c@x.com",
        "",
        "Hello",
    ];
    for line in body {
        client.write_line(line).await;
    }
    assert!(client.send(".").await.starts_with("250 "));

    let envelope = harness.envelopes.recv().await.unwrap();
    let expected_size: usize = body.iter().map(|l| l.len() + 2).sum();
    assert_eq!(envelope.size_bytes, expected_size);
    assert_eq!(envelope.recipients_to[0].as_str(), "b@x.com");
    assert_eq!(envelope.recipients_cc[0].as_str(), "c@x.com");
    assert_eq!(envelope.recipients_bcc[0].as_str(), "d@x.com");
}

#[tokio::test]
async fn ehlo_capability_list() {
    let mut harness = start_server(ServerSettings {
        credentials: Some(Credentials::new("user", "secret")),
        ..settings()
    })
    .await;
    let mut client = Client::connect(harness.addr).await;

    client.write_line("EHLO client.test").await;
    let lines = client.read_reply_lines().await;
    assert!(lines.iter().any(|l| l.contains("SIZE ")));
    assert!(lines.iter().any(|l| l.contains("AUTH PLAIN LOGIN")));
    // No TLS configured, so STARTTLS must not be offered.
    assert!(!lines.iter().any(|l| l.contains("STARTTLS")));

    harness.shutdown.send(true).unwrap();
}

#[tokio::test]
async fn out_of_order_commands_rejected_without_envelope() {
    let mut harness = start_server(settings()).await;
    let mut client = Client::connect(harness.addr).await;

    assert!(client.send("RCPT TO:<b@x.com>").await.starts_with("503 "));
    client.send("EHLO x").await;
    assert!(client.send("RCPT TO:<b@x.com>").await.starts_with("503 "));
    client.send("MAIL FROM:<a@x.com>").await;
    assert!(client.send("DATA").await.starts_with("503 "));
    client.send("QUIT").await;

    assert!(
        tokio::time::timeout(Duration::from_millis(200), harness.envelopes.recv())
            .await
            .is_err(),
        "no envelope may reach the sink"
    );
}

#[tokio::test]
async fn size_exceeded_discards_but_connection_survives() {
    let mut harness = start_server(ServerSettings {
        max_message_size: 32,
        ..settings()
    })
    .await;
    let mut client = Client::connect(harness.addr).await;

    client.send("EHLO x").await;
    client.send("MAIL FROM:<a@x.com>").await;
    client.send("RCPT TO:<b@x.com>").await;
    client.send("DATA").await;
    client
        .write_line("this single line is already far past the tiny ceiling")
        .await;
    assert!(client.send(".").await.starts_with("552 "));

    // Same connection, small message goes through.
    client.send("MAIL FROM:<a@x.com>").await;
    client.send("RCPT TO:<b@x.com>").await;
    client.send("DATA").await;
    client.write_line("ok").await;
    assert!(client.send(".").await.starts_with("250 "));

    let envelope = harness.envelopes.recv().await.unwrap();
    assert_eq!(envelope.body_plain.as_deref(), Some("ok"));
    assert!(
        tokio::time::timeout(Duration::from_millis(200), harness.envelopes.recv())
            .await
            .is_err(),
        "oversized message must not reach the sink"
    );
}

#[tokio::test]
async fn overlong_command_line_rejected_connection_survives() {
    let harness = start_server(settings()).await;
    let mut client = Client::connect(harness.addr).await;

    let long = "X".repeat(2500);
    assert!(client.send(&long).await.starts_with("500 "));
    assert!(client.send("EHLO x").await.starts_with("250 "));
}

#[tokio::test]
async fn three_auth_failures_close_the_connection() {
    let harness = start_server(ServerSettings {
        credentials: Some(Credentials::new("user", "secret")),
        ..settings()
    })
    .await;
    let mut client = Client::connect(harness.addr).await;

    client.send("EHLO x").await;
    // base64("\0user\0wrong")
    let bad = "AHVzZXIAd3Jvbmc=";
    assert!(client.send(&format!("AUTH PLAIN {bad}")).await.starts_with("535 "));
    assert!(client.send(&format!("AUTH PLAIN {bad}")).await.starts_with("535 "));
    assert!(client.send(&format!("AUTH PLAIN {bad}")).await.starts_with("535 "));
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn auth_login_then_mail() {
    let mut harness = start_server(ServerSettings {
        credentials: Some(Credentials::new("user", "secret")),
        ..settings()
    })
    .await;
    let mut client = Client::connect(harness.addr).await;

    client.send("EHLO x").await;
    assert!(client.send("MAIL FROM:<a@x.com>").await.starts_with("530 "));

    assert!(client.send("AUTH LOGIN").await.starts_with("334 "));
    assert!(client.send("dXNlcg==").await.starts_with("334 ")); // "user"
    assert!(client.send("c2VjcmV0").await.starts_with("235 ")); // "secret"

    client.send("MAIL FROM:<a@x.com>").await;
    client.send("RCPT TO:<b@x.com>").await;
    client.send("DATA").await;
    client.write_line("hi").await;
    assert!(client.send(".").await.starts_with("250 "));

    let envelope = harness.envelopes.recv().await.unwrap();
    assert_eq!(envelope.sender.as_str(), "a@x.com");
}

#[tokio::test]
async fn rset_produces_unrelated_envelope() {
    let mut harness = start_server(settings()).await;
    let mut client = Client::connect(harness.addr).await;

    client.send("EHLO x").await;
    client.send("MAIL FROM:<old@x.com>").await;
    client.send("RCPT TO:<discard@x.com>").await;
    assert!(client.send("RSET").await.starts_with("250 "));

    client.send("MAIL FROM:<new@x.com>").await;
    client.send("RCPT TO:<keep@x.com>").await;
    client.send("DATA").await;
    client.write_line("fresh").await;
    assert!(client.send(".").await.starts_with("250 "));

    let envelope = harness.envelopes.recv().await.unwrap();
    assert_eq!(envelope.sender.as_str(), "new@x.com");
    assert_eq!(envelope.recipients[0].as_str(), "keep@x.com");
}

#[tokio::test]
async fn shutdown_sends_goodbye() {
    let harness = start_server(settings()).await;
    let mut client = Client::connect(harness.addr).await;
    client.send("EHLO x").await;

    harness.shutdown.send(true).unwrap();
    let goodbye = client.read_reply().await;
    assert!(goodbye.starts_with("421 "));
}
