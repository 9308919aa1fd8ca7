//! HTTP server initialization and runtime setup.
//!
//! Builds the rate limiter, access logging and user services, runs the Axum
//! server, and tears the background sweeper down on shutdown.

use crate::api::middleware::{
    AccessLogSink, AdmissionGate, IdentifierExtractor, JsonLinesSink, RealIpExtractor,
    RequestObserver, TracingSink,
};
use crate::application::services::UserService;
use crate::config::Config;
use crate::infrastructure::persistence::InMemoryUserRepository;
use crate::infrastructure::rate_limit::{RateLimiterStore, spawn_sweeper};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Rate limiter store and its expiry sweeper
/// - Request observer with the configured access log sink (and its writer
///   task for `stdout`)
/// - In-memory user service
/// - Axum HTTP server with graceful shutdown on Ctrl+C / SIGTERM
///
/// # Errors
///
/// Returns an error if:
/// - The rate limit configuration is invalid
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let rate_limiter = Arc::new(RateLimiterStore::new(config.rate_limit())?);
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        rate_limiter.clone(),
        rate_limiter.ttl(),
        shutdown.clone(),
    );
    info!("Rate limit sweeper started");

    let extractor: Arc<dyn IdentifierExtractor> =
        Arc::new(RealIpExtractor::new(config.behind_proxy));
    let (sink, access_log_writer) = match config.access_log_sink.as_str() {
        "stdout" => {
            let (sink, writer) = JsonLinesSink::stdout(config.access_log_queue_capacity);
            let sink: Arc<dyn AccessLogSink> = Arc::new(sink);
            (sink, Some(writer))
        }
        _ => {
            let sink: Arc<dyn AccessLogSink> = Arc::new(TracingSink);
            (sink, None)
        }
    };
    let observer = Arc::new(RequestObserver::new(
        config.body_limits(),
        extractor.clone(),
        sink,
    ));
    let gate = AdmissionGate::new(
        rate_limiter.clone(),
        extractor,
        config.rate_limit_exempt_preflight,
    );

    let user_service = Arc::new(UserService::new(Arc::new(InMemoryUserRepository::new())));
    let state = AppState::new(user_service, rate_limiter);

    let app = app_router(state, observer, gate);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await?;

    info!("Server stopped, shutting down background tasks");
    shutdown.cancel();
    sweeper.await?;
    // The router, and with it the last sink handle, is gone once serve returns.
    if let Some(writer) = access_log_writer {
        writer.await?;
    }

    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then cancels `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => warn!("Received SIGTERM, initiating graceful shutdown"),
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
