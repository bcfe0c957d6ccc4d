//! Load order reconciliation handler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use super::{api_error, required_header, tenant_id, ApiError, CHANNEL_HEADER};
use crate::api::ApiState;
use crate::files::ReconcileInputs;

/// Reconciliation result.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    /// The submission matches the master list.
    pub matches: bool,

    /// Differences to fix; empty when `matches`.
    pub report: String,

    /// Where users find the file they submit.
    pub display_path: String,
}

/// Compare a submitted load order (request body) against the master list.
///
/// Only allowed from approved channels while validation is enabled.
pub async fn reconcile(
    State(state): State<Arc<ApiState>>,
    Path(tenant): Path<String>,
    headers: HeaderMap,
    submitted: String,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let tenant = tenant_id(tenant)?;
    let channel = required_header(&headers, CHANNEL_HEADER)?;

    if !state
        .store
        .is_approved_channel(&tenant, channel)
        .await
        .map_err(api_error)?
    {
        return Err((
            StatusCode::FORBIDDEN,
            format!("Channel {} is not approved", channel),
        ));
    }

    let settings = state.store.get_settings(&tenant).await.map_err(api_error)?;
    if !settings.enabled {
        return Err((
            StatusCode::CONFLICT,
            "Loadorder validation is currently disabled".to_string(),
        ));
    }

    let inputs = ReconcileInputs::load(&state.archiver, &tenant)
        .await
        .map_err(api_error)?;
    let report = inputs.compare(&submitted);

    tracing::debug!(tenant = %tenant, matches = report.is_empty(), "Reconciled load order");

    Ok(Json(ReconcileResponse {
        matches: report.is_empty(),
        report,
        display_path: settings.display_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::ACTOR_HEADER;
    use crate::store::{StoreConfig, TenantId, TenantStore};
    use tempfile::TempDir;

    async fn test_state() -> (TempDir, Arc<ApiState>, TenantId) {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(ApiState::new(TenantStore::new(StoreConfig::new(
            dir.path().to_path_buf(),
        ))));
        let tenant = TenantId::new("guild-1").unwrap();
        state.store.load(&tenant, "owner").await;
        state.store.add_channel(&tenant, "chan-1").await.unwrap();
        (dir, state, tenant)
    }

    fn channel_headers(channel: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CHANNEL_HEADER, channel.parse().unwrap());
        headers.insert(ACTOR_HEADER, "user-1".parse().unwrap());
        headers
    }

    async fn call(
        state: &Arc<ApiState>,
        channel: &str,
        submitted: &str,
    ) -> Result<Json<ReconcileResponse>, ApiError> {
        reconcile(
            State(Arc::clone(state)),
            Path("guild-1".to_string()),
            channel_headers(channel),
            submitted.to_string(),
        )
        .await
    }

    #[tokio::test]
    async fn test_reconcile_reports_differences() {
        let (dir, state, _tenant) = test_state().await;
        tokio::fs::write(dir.path().join("guild-1/loadorder.txt"), "A\nB\n")
            .await
            .unwrap();

        let Json(response) = call(&state, "chan-1", "a\nC\n").await.unwrap();
        assert!(!response.matches);
        assert_eq!(
            response.report,
            "Your loadorder is missing:\nb\n\nYour loadorder should not have:\nc\n"
        );
        assert_eq!(response.display_path, "MO2/profiles/[profile]/loadorder.txt");

        let Json(response) = call(&state, "chan-1", "a\nb\n").await.unwrap();
        assert!(response.matches);
        assert!(response.report.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_requires_approved_channel() {
        let (_dir, state, _tenant) = test_state().await;
        let (status, _) = call(&state, "chan-2", "a\n").await.unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_reconcile_refused_while_disabled() {
        let (dir, state, tenant) = test_state().await;
        tokio::fs::write(dir.path().join("guild-1/loadorder.txt"), "A\n")
            .await
            .unwrap();
        state.store.set_enabled(&tenant, false).await.unwrap();

        let (status, message) = call(&state, "chan-1", "a\n").await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Loadorder validation is currently disabled");
    }

    #[tokio::test]
    async fn test_reconcile_without_master_list() {
        let (_dir, state, _tenant) = test_state().await;
        let (status, _) = call(&state, "chan-1", "a\n").await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
