//! HTTP gateway server built on axum.

use super::GatewayConfig;
use super::auth::{AUTH_HEADER, GatewayAuth};
use super::handlers;
use crate::clients::{GithubClient, HubClient};
use crate::error::{ClientError, StoreError};
use crate::orchestrator::Orchestrator;
use crate::store::ArtifactStore;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Everything a request handler needs.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: ArtifactStore,
    pub hub: HubClient,
    pub github: GithubClient,
    pub auth: GatewayAuth,
    started_at: Instant,
}

/// Shared state handed to axum handlers.
pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: ArtifactStore,
        hub: HubClient,
        github: GithubClient,
        auth: GatewayAuth,
    ) -> Self {
        Self {
            orchestrator,
            store,
            hub,
            github,
            auth,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Reject the request unless it carries a valid `X-Authorization` header.
    pub(crate) fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        if self.auth.is_open_mode() {
            return Ok(());
        }
        let Some(value) = headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok()) else {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "Missing X-Authorization header",
            ));
        };
        if self.auth.validate(value) {
            Ok(())
        } else {
            Err(ApiError::new(StatusCode::FORBIDDEN, "Invalid access token"))
        }
    }
}

/// Error response rendered as `{"error": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Duplicate { .. } => StatusCode::CONFLICT,
            StoreError::Invalid { .. } => StatusCode::BAD_REQUEST,
            StoreError::Sqlite(_) | StoreError::Task { .. } => {
                warn!(error = %err, "Store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        if err.is_not_found() {
            return Self::not_found(err.to_string());
        }
        warn!(error = %err, "Upstream failure");
        Self::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

/// Decode a JSON body, mapping any failure to 400.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Request body must be valid JSON: {e}")))
}

/// Build the axum router with every route.
pub fn router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/rate", post(handlers::rate))
        .route("/ingest", post(handlers::ingest))
        .route("/reset", axum::routing::delete(handlers::reset))
        .route("/authenticate", put(handlers::authenticate))
        .route("/artifacts", post(handlers::list_artifacts))
        .route("/artifact/byName/{name}", get(handlers::by_name))
        .route("/artifact/byRegEx", post(handlers::by_regex))
        .route("/artifact/{kind}", post(handlers::create_artifact))
        .route(
            "/artifact/{kind}/{id}",
            get(handlers::get_artifact)
                .put(handlers::update_artifact)
                .delete(handlers::delete_artifact),
        )
        .route("/artifact/{kind}/{id}/rate", get(handlers::rate_artifact))
        .route("/artifact/{kind}/{id}/cost", get(handlers::cost))
        .route(
            "/artifact/{kind}/{id}/license-check",
            post(handlers::license_check),
        )
        .route("/artifact/{kind}/{id}/lineage", get(handlers::artifact_lineage))
        .route("/lineage", get(handlers::lineage))
        .route("/adjacency", get(handlers::adjacency))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway on the configured address; runs until Ctrl-C.
pub async fn run(state: SharedState, config: &GatewayConfig) -> Result<(), std::io::Error> {
    let app = router(state, config);
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down gateway");
            }
        })
        .await?;
    Ok(())
}
