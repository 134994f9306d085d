use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::hosting::{
    ConfigurationIssue, ContentPaths, HostingTree, LockError, MatchError, Mount, MountLock,
    ResolvedMountSummary, VirtualHosts,
};
use crate::http::request::farthest_host;
use crate::http::server::AppState;

/// JSON error body with the status it is sent with.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<MatchError> for ApiError {
    fn from(e: MatchError) -> Self {
        let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.to_string())
    }
}

impl From<LockError> for ApiError {
    fn from(e: LockError) -> Self {
        let status = match e {
            LockError::UnknownMount(_) => StatusCode::NOT_FOUND,
            LockError::AlreadyLocked { .. } | LockError::NotLockedBy { .. } => StatusCode::CONFLICT,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub generation: u64,
    pub stale: bool,
    pub host_groups: Vec<String>,
    pub virtual_hosts: usize,
    pub mounts: usize,
    pub issues: usize,
    pub cached_hosts: usize,
}

/// A mount as shown by the admin API.
#[derive(Serialize)]
pub struct MountView {
    pub identifier: String,
    pub name: String,
    pub alias: Option<String>,
    pub host_name: String,
    pub host_group: String,
    pub port: u16,
    pub mount_path: String,
    pub mount_point: Option<String>,
    pub preview_mount_point: Option<String>,
    pub types: Vec<String>,
    pub locale: Option<String>,
    pub scheme: String,
    pub is_mapped: bool,
    pub is_site: bool,
    pub named_pipeline: Option<String>,
    pub content: ContentPaths,
    pub properties: BTreeMap<String, String>,
    pub lock: Option<MountLock>,
}

impl MountView {
    fn new(tree: &HostingTree, mount: &Mount, lock: Option<MountLock>) -> Self {
        let host = tree.host(mount.virtual_host_id());
        Self {
            identifier: mount.identifier().to_string(),
            name: mount.name().to_string(),
            alias: mount.alias().map(str::to_string),
            host_name: host.host_name().to_string(),
            host_group: mount.host_group_name().to_string(),
            port: mount.port(),
            mount_path: mount.mount_path().to_string(),
            mount_point: mount.mount_point().map(str::to_string),
            preview_mount_point: mount.preview_mount_point().map(str::to_string),
            types: mount.types().into_iter().map(str::to_string).collect(),
            locale: mount.locale().map(str::to_string),
            scheme: mount.scheme().to_string(),
            is_mapped: mount.is_mapped(),
            is_site: mount.is_site(),
            named_pipeline: mount.named_pipeline().map(str::to_string),
            content: mount.content_paths().clone(),
            properties: mount.custom_properties().clone(),
            lock,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub host: Option<String>,
    pub context_path: Option<String>,
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub raw_host: String,
    pub mount: ResolvedMountSummary,
}

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub user: String,
}

fn current(state: &AppState) -> Result<std::sync::Arc<VirtualHosts>, ApiError> {
    Ok(state.manager.virtual_hosts()?)
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let stale = state.manager.is_stale();
    let hosts = current(&state)?;
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        generation: hosts.generation(),
        stale,
        host_groups: hosts.host_group_names().into_iter().map(str::to_string).collect(),
        virtual_hosts: hosts.tree().hosts().len(),
        mounts: hosts.tree().mounts().len(),
        issues: hosts.issues().len(),
        cached_hosts: hosts.cached_hosts(),
    }))
}

pub async fn get_issues(State(state): State<AppState>) -> Result<Json<Vec<ConfigurationIssue>>, ApiError> {
    let hosts = current(&state)?;
    Ok(Json(hosts.issues().to_vec()))
}

pub async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, ApiError> {
    let raw_host = params
        .host
        .or_else(|| farthest_host(&headers))
        .ok_or_else(|| ApiError::from(MatchError::EmptyHost))?;
    let path = params.path.unwrap_or_else(|| "/".to_string());

    let hosts = current(&state)?;
    let host = hosts
        .match_virtual_host(&raw_host)?
        .ok_or_else(|| ApiError::not_found(format!("no virtual host matches '{}'", raw_host)))?;
    let mount = host
        .match_mount(params.context_path.as_deref(), &path)
        .ok_or_else(|| ApiError::not_found(format!("'{}' has no mount for '{}'", raw_host, path)))?;

    Ok(Json(ResolveResponse {
        raw_host,
        mount: mount.summary(),
    }))
}

pub async fn get_mount(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<MountView>, ApiError> {
    let hosts = current(&state)?;
    let mount = hosts
        .mount_by_identifier(&identifier)
        .ok_or_else(|| ApiError::not_found(format!("mount '{}' is unknown", identifier)))?;
    let lock = state.manager.locks().lock_of(&identifier);
    Ok(Json(MountView::new(hosts.tree(), mount, lock)))
}

pub async fn get_mount_by_alias(
    State(state): State<AppState>,
    Path((group, alias, mount_type)): Path<(String, String, String)>,
) -> Result<Json<MountView>, ApiError> {
    let hosts = current(&state)?;
    let mount = hosts
        .mount_by_group_alias_and_type(&group, &alias, &mount_type)?
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "no mount with alias '{}' and type '{}' in host group '{}'",
                alias, mount_type, group
            ))
        })?;
    let lock = state.manager.locks().lock_of(mount.identifier());
    Ok(Json(MountView::new(hosts.tree(), mount, lock)))
}

pub async fn lock_mount(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(request): Json<LockRequest>,
) -> Result<Json<MountLock>, ApiError> {
    Ok(Json(state.manager.lock_mount(&identifier, &request.user)?))
}

pub async fn unlock_mount(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(request): Json<LockRequest>,
) -> Result<StatusCode, ApiError> {
    state.manager.unlock_mount(&identifier, &request.user)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn invalidate(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    state.manager.invalidate();
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "stale": true })))
}
