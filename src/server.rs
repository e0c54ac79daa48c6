// HTTP server for the quota broker
//
// Endpoints:
// - GET /request_quota?model_name=..&tokens=..  (tokens in thousands)
// - GET /used_quotas?model_name=..
// - GET /model_quotas?model_name=..
// - GET /health
// - GET /metrics (Prometheus text, when enabled)

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics;
use crate::quota::{AdmissionCoordinator, AdmissionOutcome, ModelName, QuotaError};

/// Tokens per unit of the `tokens` query parameter
pub const REQUEST_TOKEN_UNIT: u64 = 1000;

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    coordinator: Arc<AdmissionCoordinator>,
}

impl AppState {
    /// Wrap a coordinator for the handlers
    pub fn new(coordinator: Arc<AdmissionCoordinator>) -> Self {
        Self { coordinator }
    }
}

/// Query for /request_quota
#[derive(Debug, Deserialize)]
pub struct QuotaQuery {
    /// Model to reserve tokens for
    pub model_name: ModelName,

    /// Thousands of tokens wanted
    pub tokens: u64,
}

/// Query for the reporting endpoints
#[derive(Debug, Deserialize)]
pub struct ModelQuery {
    /// Model to report on
    pub model_name: ModelName,
}

/// Body returned when tokens were reserved
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObtainedQuotaResponse {
    pub model_identity: String,
    pub tokens: u64,
    pub model_name: ModelName,
}

/// Body returned when the caller must come back later
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NoObtainedQuotaResponse {
    pub model_name: ModelName,
    pub tokens: u64,
    pub wait_seconds: u64,
    pub model_identity: String,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: u16,
    pub detail: String,
}

impl IntoResponse for QuotaError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code(),
            detail: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Build the application router
pub fn router(coordinator: Arc<AdmissionCoordinator>, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/request_quota", get(request_quota_handler))
        .route("/used_quotas", get(used_quotas_handler))
        .route("/model_quotas", get(model_quotas_handler))
        .route("/health", get(health_handler))
        .with_state(AppState::new(coordinator));

    if metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(TraceLayer::new_for_http())
}

/// Start the HTTP server and run until Ctrl-C
pub async fn serve(
    addr: &str,
    coordinator: Arc<AdmissionCoordinator>,
    metrics_enabled: bool,
) -> Result<()> {
    let app = router(coordinator, metrics_enabled);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(addr = %addr, metrics_enabled, "Starting quota broker");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Quota broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Reserve tokens or report how long to wait
async fn request_quota_handler(
    State(state): State<AppState>,
    Query(query): Query<QuotaQuery>,
) -> Result<Response, QuotaError> {
    let request_id = uuid::Uuid::new_v4();
    let model = query.model_name;
    let tokens = query.tokens.saturating_mul(REQUEST_TOKEN_UNIT);

    tracing::debug!(
        request_id = %request_id,
        model = %model,
        tokens,
        "Quota requested"
    );

    if tokens == 0 {
        let err = QuotaError::ZeroTokens { model };
        metrics::observe_admission(model, &Err(err.clone()));
        return Err(err);
    }

    let limit = model.max_request_tokens();
    if tokens > limit {
        let err = QuotaError::MaxTokenExceeded {
            model,
            limit,
            requested: tokens,
        };
        metrics::observe_admission(model, &Err(err.clone()));
        return Err(err);
    }

    let result = state.coordinator.request_quota(model, tokens);
    metrics::observe_admission(model, &result);

    let response = match result? {
        AdmissionOutcome::Granted(grant) => Json(ObtainedQuotaResponse {
            model_identity: grant.resource,
            tokens: grant.tokens,
            model_name: grant.model,
        })
        .into_response(),
        AdmissionOutcome::Denied(denial) => Json(NoObtainedQuotaResponse {
            model_name: denial.model,
            tokens: denial.tokens,
            // request_quota only returns finite denials
            wait_seconds: denial.wait.as_secs().unwrap_or_default(),
            model_identity: denial.resource,
        })
        .into_response(),
    };

    Ok(response)
}

/// Tokens currently held per resource
async fn used_quotas_handler(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> Json<BTreeMap<String, u64>> {
    Json(state.coordinator.used_quotas(query.model_name))
}

/// Window capacity per resource
async fn model_quotas_handler(
    State(state): State<AppState>,
    Query(query): Query<ModelQuery>,
) -> Json<BTreeMap<String, u64>> {
    Json(state.coordinator.model_quotas(query.model_name))
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}
