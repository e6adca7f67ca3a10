//! Call Relay
//!
//! Stateful WebSocket signaling server for two-party calls.
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Construct the token verifier and call registry client
//! 4. Spawn the room directory actor
//! 5. Build the router (signaling upgrade + health probes)
//! 6. Bind the listener (fail fast on bind errors) and mark ready
//! 7. Serve until Ctrl+C/SIGTERM, then drain gracefully

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use call_relay::actors::RoomDirectoryHandle;
use call_relay::auth::TokenVerifier;
use call_relay::config::Config;
use call_relay::observability::{health_router, HealthState};
use call_relay::registry::{CallRegistry, HttpCallRegistry};
use call_relay::signaling::{self, SignalingState};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting call relay");

    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        registry_base_url = %config.registry_base_url,
        registry_timeout_ms = config.registry_timeout_ms,
        "Configuration loaded successfully"
    );

    let verifier = Arc::new(TokenVerifier::new(&config.auth_token_secret));
    let registry: Arc<dyn CallRegistry> = Arc::new(HttpCallRegistry::new(
        config.registry_base_url.clone(),
        config.registry_timeout(),
    ));

    // Root shutdown token; the directory and every connection hang off it
    let shutdown_token = CancellationToken::new();
    let directory = RoomDirectoryHandle::new(shutdown_token.child_token());
    info!("Room directory started");

    let health_state = Arc::new(HealthState::new());

    let signaling_state = SignalingState {
        verifier,
        registry,
        registry_timeout: config.registry_timeout(),
        directory,
        shutdown: shutdown_token.clone(),
    };

    let app = signaling::router(signaling_state)
        .merge(health_router(Arc::clone(&health_state)))
        .layer(TraceLayer::new_for_http());

    // Bind BEFORE serving to fail fast on bind errors
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "Listener bound");

    health_state.set_ready();
    info!("Call relay running - press Ctrl+C to shutdown");

    let shutdown_health = Arc::clone(&health_state);
    let shutdown_trigger = shutdown_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutdown signal received, initiating graceful shutdown");

            // Stop advertising readiness, then drop every connection;
            // the directory drains its rooms off the same token.
            shutdown_health.set_not_ready();
            shutdown_trigger.cancel();
        })
        .await
        .context("server error")?;

    info!("Call relay shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable
/// because without signal handlers the service cannot shut down
/// gracefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
