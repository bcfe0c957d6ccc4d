//! API request handlers.

pub mod files;
pub mod reconcile;
pub mod status;
pub mod tenants;

use std::io::ErrorKind;

use axum::http::{HeaderMap, StatusCode};

use crate::api::ApiState;
use crate::store::{StoreError, TenantId};

/// Error half of every handler result.
pub type ApiError = (StatusCode, String);

/// Header naming the identity performing a request.
pub const ACTOR_HEADER: &str = "x-actor";

/// Header naming the channel a request originates from.
pub const CHANNEL_HEADER: &str = "x-channel";

/// Status code for a store error.
pub fn status_for(error: &StoreError) -> StatusCode {
    match error {
        StoreError::InvalidTenantId(_)
        | StoreError::InvalidFileName(_)
        | StoreError::InvalidIdentity(_)
        | StoreError::InvalidDisplayPath => StatusCode::BAD_REQUEST,
        StoreError::OwnerImmutable(_) | StoreError::SelfRemoval(_) => StatusCode::FORBIDDEN,
        StoreError::NotStaff(_)
        | StoreError::NotApproved(_)
        | StoreError::UnknownFileType(_)
        | StoreError::NotLoaded(_)
        | StoreError::MasterListMissing(_) => StatusCode::NOT_FOUND,
        StoreError::AlreadyStaff(_)
        | StoreError::AlreadyApproved(_)
        | StoreError::BuiltinFileType(_) => StatusCode::CONFLICT,
        StoreError::Validation { .. } | StoreError::EmptyExtension(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::Source(_) => StatusCode::BAD_GATEWAY,
        StoreError::Io(e) if e.kind() == ErrorKind::NotFound => StatusCode::NOT_FOUND,
        StoreError::Parse(_) | StoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a store error into a handler error, logging server faults.
pub fn api_error(error: StoreError) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(error = %error, "Request failed");
    }
    (status, error.to_string())
}

/// Parse a tenant ID from a path segment.
pub fn tenant_id(raw: String) -> Result<TenantId, ApiError> {
    TenantId::new(raw).map_err(api_error)
}

/// Value of a required header.
pub fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Missing {} header", name)))
}

/// Identity from `X-Actor`, which must be staff of the tenant.
pub async fn require_staff(
    state: &ApiState,
    tenant: &TenantId,
    headers: &HeaderMap,
) -> Result<String, ApiError> {
    let actor = required_header(headers, ACTOR_HEADER)?;
    if !state.store.is_staff(tenant, actor).await.map_err(api_error)? {
        return Err((StatusCode::FORBIDDEN, format!("{} is not staff", actor)));
    }
    Ok(actor.to_string())
}
