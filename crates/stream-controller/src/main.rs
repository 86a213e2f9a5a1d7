//! Stream Controller
//!
//! Entry point for the live video session backend. Provisions live
//! sessions on the media platform, issues access tokens, and tracks the
//! live audience.
//!
//! # Startup
//!
//! 1. Initialize tracing
//! 2. Load configuration from the environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Connect to the viewer counter store (Redis)
//! 5. Build the platform client, coordinator and credential issuer
//! 6. Serve HTTP until SIGINT/SIGTERM, then drain

use common::jwt::AccessTokenSigner;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use stream_controller::config::Config;
use stream_controller::observability::metrics::init_metrics_recorder;
use stream_controller::repositories::{RedisViewerCounter, ViewerCounter};
use stream_controller::routes::{self, AppState};
use stream_controller::services::{
    CredentialIssuer, PlatformClient, ResourceProvisioner, SessionCoordinator,
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default drain period after a shutdown signal, in seconds.
const DEFAULT_DRAIN_SECONDS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stream Controller");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        video_base_url = %config.video_base_url,
        media_base_url = %config.media_base_url,
        platform_request_timeout_ms = config.platform_request_timeout.as_millis() as u64,
        request_timeout_ms = config.request_timeout().as_millis() as u64,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    // This must happen before any metrics are recorded
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    // Connect to the viewer counter store
    // Note: Do NOT log redis_url as it may contain credentials
    info!("Connecting to Redis...");
    let counter: Arc<dyn ViewerCounter> = Arc::new(
        RedisViewerCounter::connect(&config.redis_url, config.counter_timeout)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to connect to viewer counter store");
                e
            })?,
    );
    info!("Redis connection established");

    let provisioner: Arc<dyn ResourceProvisioner> =
        Arc::new(PlatformClient::new(&config).map_err(|e| {
            error!(error = %e, "Failed to build platform client");
            e
        })?);

    let coordinator = Arc::new(SessionCoordinator::new(
        Arc::clone(&provisioner),
        Arc::clone(&counter),
        config.platform_request_timeout,
    ));

    let signer = AccessTokenSigner::new(
        config.account_sid.clone(),
        config.api_key_sid.clone(),
        config.api_key_secret.clone(),
    );
    let credentials = Arc::new(CredentialIssuer::new(
        signer,
        provisioner,
        config.publisher_token_ttl,
        config.platform_request_timeout,
    ));

    // Parse bind address before moving config
    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        coordinator,
        credentials,
        counter,
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Stream Controller listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Stream Controller shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Graceful shutdown drain period
    let drain_secs: u64 = std::env::var("SC_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_DRAIN_SECONDS);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (SC_DRAIN_SECONDS=0)");
    }
}
