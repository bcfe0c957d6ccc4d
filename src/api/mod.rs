//! REST API for the pelagius daemon.
//!
//! Exposes the store, archive and update operations and reconciliation to
//! whatever front end talks to users. Callers are trusted to pass the
//! acting identity in `X-Actor` and the channel in `X-Channel`.

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::files::{FileArchiver, UpdatePipeline};
use crate::store::TenantStore;

/// Shared state for API handlers.
pub struct ApiState {
    pub store: Arc<TenantStore>,

    pub archiver: FileArchiver,

    pub pipeline: UpdatePipeline,

    /// HTTP client for fetching update sources by URL.
    pub http_client: reqwest::Client,
}

impl ApiState {
    pub fn new(store: TenantStore) -> Self {
        let store = Arc::new(store);
        let archiver = FileArchiver::new(Arc::clone(&store));
        Self {
            pipeline: UpdatePipeline::new(archiver.clone()),
            archiver,
            store,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Build the API router with all routes.
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/status", get(handlers::status::health))
        // Tenant state
        .route("/api/v1/tenants/:tenant", get(handlers::tenants::get_tenant))
        .route("/api/v1/tenants/:tenant/load", post(handlers::tenants::load_tenant))
        .route(
            "/api/v1/tenants/:tenant/settings/enabled",
            put(handlers::tenants::set_enabled),
        )
        .route(
            "/api/v1/tenants/:tenant/settings/path",
            put(handlers::tenants::set_path),
        )
        .route("/api/v1/tenants/:tenant/staff", post(handlers::tenants::add_staff))
        .route(
            "/api/v1/tenants/:tenant/staff/:identity",
            delete(handlers::tenants::remove_staff),
        )
        .route("/api/v1/tenants/:tenant/channels", post(handlers::tenants::add_channel))
        .route(
            "/api/v1/tenants/:tenant/channels/:channel",
            delete(handlers::tenants::remove_channel),
        )
        // Managed files
        .route(
            "/api/v1/tenants/:tenant/file-types",
            get(handlers::files::list_file_types).post(handlers::files::declare_file_type),
        )
        .route(
            "/api/v1/tenants/:tenant/file-types/:file_type",
            delete(handlers::files::forget_file_type),
        )
        .route(
            "/api/v1/tenants/:tenant/files/:file_type",
            get(handlers::files::retrieve).put(handlers::files::upload),
        )
        .route(
            "/api/v1/tenants/:tenant/files/:file_type/fetch",
            post(handlers::files::fetch),
        )
        .route(
            "/api/v1/tenants/:tenant/files/:file_type/archive",
            post(handlers::files::archive),
        )
        .route(
            "/api/v1/tenants/:tenant/files/:file_type/archives",
            get(handlers::files::list_archives),
        )
        // Reconciliation
        .route(
            "/api/v1/tenants/:tenant/reconcile",
            post(handlers::reconcile::reconcile),
        )
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(())
                .on_response(|response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                    let status = response.status();
                    if !status.is_success() {
                        tracing::warn!(
                            status = %status,
                            latency_ms = latency.as_millis(),
                            "request failed"
                        );
                    }
                }),
        )
        .with_state(state)
}

/// Start the API server.
pub async fn serve(state: Arc<ApiState>, bind_addr: &str) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    tracing::info!("pelagius API listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
