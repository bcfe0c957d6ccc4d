//! Tenant state handlers: load, settings, staff and channels.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use super::{api_error, require_staff, tenant_id, ApiError};
use crate::api::ApiState;
use crate::store::{validate_member, TenantSnapshot};

/// Body of a tenant load.
#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    /// Identity owning the tenant; permanently staff.
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct PathRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct StaffRequest {
    pub identity: String,
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub channel: String,
}

/// Load a tenant, creating its defaults on first sight.
pub async fn load_tenant(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<TenantSnapshot>, ApiError> {
    let tenant = tenant_id(tenant)?;
    validate_member(&request.owner).map_err(api_error)?;
    Ok(Json(state.store.load(&tenant, &request.owner).await))
}

/// Current tenant state.
pub async fn get_tenant(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TenantSnapshot>, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state.store.snapshot(&tenant).await.map(Json).map_err(api_error)
}

/// Pause or resume validation.
pub async fn set_enabled(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(request): Json<EnabledRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .set_enabled(&tenant, request.enabled)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change where users are told to find their load order.
pub async fn set_path(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(request): Json<PathRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .set_path(&tenant, &request.path)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_staff(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(request): Json<StaffRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .add_staff(&tenant, &request.identity)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_staff(
    State(state): State<Arc<ApiState>>,
    Path((tenant, identity)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    let actor = require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .remove_staff(&tenant, &identity, &actor)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_channel(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChannelRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .add_channel(&tenant, &request.channel)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::CREATED)
}

pub async fn remove_channel(
    State(state): State<Arc<ApiState>>,
    Path((tenant, channel)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .remove_channel(&tenant, &channel)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
