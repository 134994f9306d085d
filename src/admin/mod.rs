//! Admin / inspection API.
//!
//! Every route sits behind bearer-key authentication.

pub mod auth;
pub mod handlers;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;
use crate::observability::metrics;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/issues", get(get_issues))
        .route("/admin/resolve", get(resolve))
        .route("/admin/mounts/{identifier}", get(get_mount))
        .route("/admin/aliases/{group}/{alias}/{mount_type}", get(get_mount_by_alias))
        .route("/admin/mounts/{identifier}/lock", post(lock_mount).delete(unlock_mount))
        .route("/admin/invalidate", post(invalidate))
        .route_layer(middleware::from_fn(record_request))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

async fn record_request(request: Request<Body>, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    let response = next.run(request).await;
    metrics::record_admin_request(endpoint, response.status().as_u16());
    response
}
