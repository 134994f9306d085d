//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP invalidates the hosting registry, it does not shut down

use std::sync::Arc;

use crate::hosting::HostingManager;
use crate::lifecycle::shutdown::Shutdown;

/// Wait for Ctrl+C or SIGTERM, then trigger `shutdown`.
pub async fn shutdown_on_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.trigger();
}

/// Invalidate the registry on every SIGHUP until shutdown.
#[cfg(unix)]
pub async fn invalidate_on_hangup(manager: Arc<HostingManager>, shutdown: Shutdown) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for SIGHUP");
            return;
        }
    };
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received");
                manager.invalidate();
            }
            _ = stop.recv() => break,
        }
    }
}

#[cfg(not(unix))]
pub async fn invalidate_on_hangup(_manager: Arc<HostingManager>, _shutdown: Shutdown) {}
