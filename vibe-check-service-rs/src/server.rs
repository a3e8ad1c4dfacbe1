//! HTTP surface of the service

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION,
    CONTENT_TYPE,
};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use vibe_sdk::ServiceClient;

use crate::config::SERVICE_NAME;
use crate::error::ErrorResponse;
use crate::models::VibeCheckRequest;
use crate::pipeline::VibeCheckPipeline;

/// Paths that accept a vibe check request
pub const CHECK_VIBE_ROUTES: [&str; 3] = ["/", "/check-vibe-rag", "/functions/v1/check-vibe-rag"];

/// Bound on each dependency probe made by `/health`
pub const DEFAULT_HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
}

/// Shared service state
pub struct VibeCheckService {
    pipeline: Arc<VibeCheckPipeline>,
    dependencies: Vec<Arc<dyn ServiceClient>>,
    max_body_bytes: usize,
    health_probe_timeout: Duration,
    started: Instant,
}

impl VibeCheckService {
    pub fn new(pipeline: VibeCheckPipeline, max_body_bytes: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            dependencies: Vec::new(),
            max_body_bytes,
            health_probe_timeout: DEFAULT_HEALTH_PROBE_TIMEOUT,
            started: Instant::now(),
        }
    }

    pub fn with_health_probe_timeout(mut self, timeout: Duration) -> Self {
        self.health_probe_timeout = timeout;
        self
    }

    /// Register an upstream client reported by `/health`
    pub fn with_dependency(mut self, client: Arc<dyn ServiceClient>) -> Self {
        self.dependencies.push(client);
        self
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        let max_body_bytes = self.max_body_bytes;

        let router = CHECK_VIBE_ROUTES.iter().fold(Router::new(), |router, path| {
            router.route(path, post(Self::check_vibe_handler).options(Self::preflight_handler))
        });

        router
            .route("/health", get(Self::health_handler))
            .layer(DefaultBodyLimit::max(max_body_bytes))
            .layer(RequestBodyLimitLayer::new(max_body_bytes))
            .layer(cors_layer())
            .layer(TraceLayer::new_for_http())
            .with_state(self)
    }

    /// POST - run a vibe check
    async fn check_vibe_handler(State(state): State<Arc<Self>>, body: Bytes) -> Response {
        let value: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Rejected request with invalid JSON body: {}", e);
                let envelope = ErrorResponse::new("Invalid JSON body").with_details(e.to_string());
                return (StatusCode::BAD_REQUEST, Json(envelope)).into_response();
            }
        };

        let request = match VibeCheckRequest::from_json(&value) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Rejected request: {}", e);
                return e.into_response();
            }
        };

        let span = tracing::info_span!("check_vibe", user_id = %request.user_id);
        match state.pipeline.run(&request).instrument(span).await {
            Ok(response) => (StatusCode::OK, Json(response)).into_response(),
            Err(e) => {
                log::error!("Vibe check failed for user {}: {}", request.user_id, e);
                e.into_response()
            }
        }
    }

    /// OPTIONS without CORS request headers; browser preflights are
    /// answered by the CORS layer before reaching this
    async fn preflight_handler() -> impl IntoResponse {
        (
            StatusCode::OK,
            [
                (ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
                (ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type, Authorization"),
            ],
            "ok",
        )
    }

    /// GET /health - service and upstream status
    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        let probe_timeout = state.health_probe_timeout;
        let probes = state.dependencies.iter().map(|client| async move {
            match tokio::time::timeout(probe_timeout, client.health_check()).await {
                Ok(Ok(true)) => true,
                Ok(Ok(false)) => {
                    log::warn!("Dependency {} is unhealthy", client.name());
                    false
                }
                Ok(Err(e)) => {
                    log::warn!("Dependency {} health check errored: {}", client.name(), e);
                    false
                }
                Err(_) => {
                    log::warn!("Dependency {} health check timed out after {:?}", client.name(), probe_timeout);
                    false
                }
            }
        });
        let healthy_count = join_all(probes).await.into_iter().filter(|healthy| *healthy).count();

        let total = state.dependencies.len();
        let status = if healthy_count == total {
            "SERVING"
        } else if healthy_count == 0 {
            "CRITICAL"
        } else {
            "DEGRADED"
        };

        Json(HealthResponse {
            healthy: healthy_count > 0 || total == 0,
            service_name: SERVICE_NAME.to_string(),
            uptime_seconds: state.started.elapsed().as_secs() as i64,
            status: status.to_string(),
        })
    }
}

/// Wildcard origin, `POST, OPTIONS`, `Content-Type, Authorization`
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}
