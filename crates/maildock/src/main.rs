//! The maildock server binary.
//!
//! Runs the SMTP receiver and the HTTP control plane in one process,
//! configured through the environment. A `gen-token` subcommand prints
//! a signed control-plane bearer token.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod api;

use anyhow::Context;
use maildock_core::{Config, MessageStore};
use maildock_smtp::connection::load_server_config;
use maildock_smtp::{Credentials, ServerSettings, serve};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maildock=info,maildock_smtp=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => run(),
        Some("gen-token") => gen_token(args.next(), args.next()),
        Some(other) => anyhow::bail!("unknown subcommand: {other} (expected gen-token)"),
    }
}

/// Prints a signed bearer token for `subject`, valid for `days` days
/// (30 when omitted).
fn gen_token(subject: Option<String>, days: Option<String>) -> anyhow::Result<()> {
    let subject = subject.context("usage: maildock gen-token <subject> [days]")?;
    let days = match days {
        Some(value) => value.parse().context("days must be an integer")?,
        None => 30,
    };
    let secret = std::env::var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;
    let token = api::token::issue(&secret, &subject, days)?;
    println!("{token}");
    Ok(())
}

#[tokio::main]
async fn run() -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env().context("loading configuration")?);
    let jwt_secret = config
        .jwt_secret_key
        .clone()
        .context("JWT_SECRET_KEY must be set")?;
    let store = Arc::new(MessageStore::new());

    let tls = match (&config.tls_certfile, &config.tls_keyfile) {
        (Some(cert), Some(key)) if config.enable_tls => {
            Some(load_server_config(cert, key).context("loading TLS material")?)
        }
        _ => None,
    };
    let credentials = match (config.enable_auth, &config.smtp_username, &config.smtp_password) {
        (true, Some(user), Some(pass)) => Some(Credentials::new(user.as_str(), pass.as_str())),
        _ => None,
    };
    let settings = Arc::new(ServerSettings {
        hostname: config.hostname.clone(),
        max_message_size: config.max_message_size,
        max_connections: config.max_connections,
        idle_timeout: Duration::from_secs(config.idle_timeout_secs),
        require_tls: config.require_tls,
        credentials,
        tls,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let smtp_listener = TcpListener::bind(config.smtp_addr())
        .await
        .with_context(|| format!("binding SMTP listener on {}", config.smtp_addr()))?;
    let smtp = tokio::spawn(serve(
        smtp_listener,
        settings,
        Arc::clone(&store),
        shutdown_rx.clone(),
    ));

    let http_listener = TcpListener::bind(config.http_addr())
        .await
        .with_context(|| format!("binding HTTP listener on {}", config.http_addr()))?;
    tracing::info!(addr = %config.http_addr(), "control plane listening");

    let app = api::router(api::AppState::new(store, Arc::clone(&config), jwt_secret));
    let mut http_shutdown = shutdown_rx;
    let http = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.changed().await;
            })
            .await
    });

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = tokio::time::timeout(Duration::from_secs(5), smtp).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), http).await;
    Ok(())
}
