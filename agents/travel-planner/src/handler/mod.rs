//! HTTP handler for the travel planner
//!
//! - POST /plan - fan out to the sub-agents and aggregate
//! - GET /health - liveness and configured sub-agents
//! - GET /metrics - Prometheus text exposition

use agent_trace::{SpanSink, TraceParent};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::contracts::*;
use crate::engine::{Planner, AGENT_ID, AGENT_NAME};
use crate::telemetry::metrics::{PlannerMetrics, OUTCOME_INVALID};
use crate::telemetry::MetricsRegistry;

/// Application state
pub struct AppState {
    pub planner: Planner,
    pub sink: Arc<dyn SpanSink>,
    pub metrics: Arc<MetricsRegistry>,
}

impl AppState {
    /// Wires the planner to the registry's metrics.
    pub fn new(planner: Planner, sink: Arc<dyn SpanSink>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            planner: planner.with_metrics(metrics.planner()),
            sink,
            metrics,
        }
    }

    fn planner_metrics(&self) -> Arc<PlannerMetrics> {
        self.metrics.planner()
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/plan", post(plan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: AGENT_ID.to_string(),
        agent_name: AGENT_NAME.to_string(),
        sub_agents: state.planner.agent_names(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Plan a trip
async fn plan(
    State(state): State<Arc<AppState>>,
    TraceParent(ctx): TraceParent,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Result<Json<PlanResponse>, (StatusCode, Json<ApiError>)> {
    let Json(request) = payload.map_err(|e| {
        state.planner_metrics().record_request(OUTCOME_INVALID);
        bad_request("InvalidBody", e.body_text())
    })?;

    let outcome = state.planner.plan(&request, ctx).await.map_err(|e| {
        state.planner_metrics().record_request(OUTCOME_INVALID);
        bad_request("InvalidInput", e.to_string())
    })?;

    state.sink.emit(outcome.span);
    Ok(Json(outcome.response))
}

fn bad_request(error: &str, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError {
            error: error.to_string(),
            message: message.into(),
            request_id: Some(Uuid::new_v4()),
        }),
    )
}
