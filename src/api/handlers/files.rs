//! Managed file handlers: file types, update, archive and retrieval.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{api_error, require_staff, tenant_id, ApiError};
use crate::api::ApiState;
use crate::files::fetch::fetch_stream;
use crate::files::update::SourceError;
use crate::files::UpdateOutcome;
use crate::store::{StoreError, TenantId};

/// A known file type.
#[derive(Debug, Serialize)]
pub struct FileTypeEntry {
    pub name: String,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeclareRequest {
    pub name: String,
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: String,
}

/// Update response.
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    #[serde(flatten)]
    pub outcome: UpdateOutcome,

    /// Validation was switched back on after a load order update.
    pub validation_resumed: bool,
}

#[derive(Debug, Serialize)]
pub struct ArchiveResponse {
    /// Where the canonical file went; `None` if there was none.
    pub archived: Option<String>,
}

/// List built-in and tenant-declared file types.
pub async fn list_file_types(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<FileTypeEntry>>, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;

    let types = state.store.file_types(&tenant).await.map_err(api_error)?;
    Ok(Json(
        types
            .into_iter()
            .map(|(name, file_name)| FileTypeEntry { name, file_name })
            .collect(),
    ))
}

pub async fn declare_file_type(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    Json(request): Json<DeclareRequest>,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .declare_file_type(&tenant, &request.name, &request.file_name)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::CREATED)
}

pub async fn forget_file_type(
    State(state): State<Arc<ApiState>>,
    Path((tenant, file_type)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    state
        .store
        .forget_file_type(&tenant, &file_type)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace a managed file with the request body.
pub async fn upload(
    State(state): State<Arc<ApiState>>,
    Path((tenant, file_type)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UpdateResponse>, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;
    apply_update(&state, &tenant, &file_type, body.into_data_stream()).await
}

/// Replace a managed file with the contents of a URL.
pub async fn fetch(
    State(state): State<Arc<ApiState>>,
    Path((tenant, file_type)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<FetchRequest>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;

    // Resolve first so an unknown type fails before any download starts.
    state
        .store
        .resolve_file_name(&tenant, &file_type)
        .await
        .map_err(api_error)?;

    let source = fetch_stream(&state.http_client, &request.url)
        .await
        .map_err(api_error)?;
    apply_update(&state, &tenant, &file_type, source).await
}

/// Run an update and apply the policies that follow it.
///
/// A load order update switches validation back on. Content that fails
/// validation is archived straight away so the canonical slot is left
/// empty rather than invalid.
async fn apply_update<S, E>(
    state: &ApiState,
    tenant: &TenantId,
    file_type: &str,
    source: S,
) -> Result<Json<UpdateResponse>, ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<SourceError>,
{
    match state.pipeline.update(tenant, file_type, source).await {
        Ok(outcome) => {
            let mut validation_resumed = false;
            if outcome.resume_validation {
                match state.store.set_enabled(tenant, true).await {
                    Ok(()) => validation_resumed = true,
                    Err(e) => error!(tenant = %tenant, error = %e, "Failed to resume validation"),
                }
            }
            Ok(Json(UpdateResponse {
                outcome,
                validation_resumed,
            }))
        }
        Err(e @ StoreError::Validation { .. }) => {
            if !state.store.config().staged_updates {
                match state.archiver.archive_if_present(tenant, file_type).await {
                    Ok(_) => info!(tenant = %tenant, file_type = %file_type, "Archived invalid upload"),
                    Err(archive_err) => warn!(
                        tenant = %tenant,
                        file_type = %file_type,
                        error = %archive_err,
                        "Failed to archive invalid upload"
                    ),
                }
            }
            Err(api_error(e))
        }
        Err(e) => Err(api_error(e)),
    }
}

/// Archive the canonical file for a type.
pub async fn archive(
    State(state): State<Arc<ApiState>>,
    Path((tenant, file_type)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ArchiveResponse>, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;

    let archived = state
        .archiver
        .archive_if_present(&tenant, &file_type)
        .await
        .map_err(api_error)?;

    Ok(Json(ArchiveResponse {
        archived: archived.map(|path| path.display().to_string()),
    }))
}

/// Names of the archived copies of a type.
pub async fn list_archives(
    State(state): State<Arc<ApiState>>,
    Path((tenant, file_type)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;

    let archives = state
        .archiver
        .archives(&tenant, &file_type)
        .await
        .map_err(api_error)?;

    Ok(Json(
        archives
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect(),
    ))
}

/// Download the canonical file for a type.
pub async fn retrieve(
    State(state): State<Arc<ApiState>>,
    Path((tenant, file_type)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let tenant = tenant_id(tenant)?;
    require_staff(&state, &tenant, &headers).await?;

    let file_name = state
        .store
        .resolve_file_name(&tenant, &file_type)
        .await
        .map_err(api_error)?;
    let bytes = state
        .archiver
        .retrieve(&tenant, &file_type)
        .await
        .map_err(api_error)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}
