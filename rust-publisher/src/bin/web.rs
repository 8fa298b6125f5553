//! wabridge Web Server - WhatsApp webhook receiver.
//!
//! This binary:
//! - Answers the webhook subscription handshake
//! - Validates inbound notifications
//! - Publishes them to Pub/Sub with an idempotency key
//! - Returns 202 with the queue-assigned message id

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wabridge::{router, AppState, BatchingPublisher, Config, PubSubClient};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    install_panic_hook();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "web_server_failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.port,
        project_id = %config.project_id,
        topic_id = %config.topic_id,
        signature_check_enabled = config.app_secret.is_some(),
        service_account_configured = config.service_account.is_some(),
        pubsub_emulator_host = ?config.pubsub_emulator_host,
        "config_loaded"
    );

    if config.verify_token.is_empty() {
        warn!("WEBHOOK_VERIFY_TOKEN is not set; the handshake only accepts an empty token");
    }

    // Create Pub/Sub publisher
    let client = PubSubClient::from_config(&config).context("Failed to create Pub/Sub client")?;

    let publisher = Arc::new(BatchingPublisher::new(
        client,
        config.batch_settings(),
        config.publish_timeout,
    ));

    // Create application state
    let state = AppState::new(config.clone(), publisher.clone());

    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Flush messages still waiting for a batch
    publisher.close().await;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Log panics through tracing so they land in the JSON log stream.
///
/// Request panics are turned into 500 responses by the router; this hook only
/// records them.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        error!(panic = %message, location = %location, "uncaught_panic");
    }));
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
