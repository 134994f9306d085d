//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router for the admin / inspection API
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and stop on the shutdown signal

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::schema::AdminConfig;
use crate::hosting::HostingManager;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<HostingManager>,
    pub admin: Arc<AdminConfig>,
}

/// HTTP server for the admin API.
pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(manager: Arc<HostingManager>, config: AdminConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let state = AppState {
            manager,
            admin: Arc::new(config),
        };
        Self {
            router: Self::build_router(state, timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, timeout: Duration) -> Router {
        setup_admin_router(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The router, for serving it elsewhere or calling it in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` completes.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Admin server stopped");
        Ok(())
    }
}
