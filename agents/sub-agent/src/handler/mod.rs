//! HTTP handler for the sub-agent service

use agent_trace::{SpanSink, TraceParent};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::contracts::*;
use crate::engine::SubAgent;

/// Application state
pub struct AppState {
    pub agent: SubAgent,
    pub sink: Arc<dyn SpanSink>,
}

impl AppState {
    pub fn new(agent: SubAgent, sink: Arc<dyn SpanSink>) -> Self {
        Self { agent, sink }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/invoke", post(invoke))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let profile = state.agent.profile();
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_id: profile.agent_id().to_string(),
        agent_name: profile.display_name().to_string(),
        tools: profile.tools().iter().map(|t| t.to_string()).collect(),
    })
}

/// HTTP status for a settled invocation.
pub fn status_code(result: &SubAgentResult) -> StatusCode {
    match (result.status, result.error_detail.as_deref()) {
        (AgentStatus::Ok, _) => StatusCode::OK,
        (AgentStatus::Timeout, _) => StatusCode::GATEWAY_TIMEOUT,
        (AgentStatus::Error, Some("rate_limited")) => StatusCode::TOO_MANY_REQUESTS,
        (AgentStatus::Error, _) => StatusCode::BAD_GATEWAY,
    }
}

/// Invoke the agent
async fn invoke(
    State(state): State<Arc<AppState>>,
    TraceParent(ctx): TraceParent,
    payload: Result<Json<InvokeRequest>, JsonRejection>,
) -> Result<Response, (StatusCode, Json<ApiError>)> {
    let Json(request) = payload.map_err(|e| bad_request("InvalidBody", e.body_text()))?;

    if request.message.trim().is_empty() {
        return Err(bad_request("InvalidInput", "message must not be empty"));
    }
    if let Some(fault) = &request.fault {
        fault
            .validate_for_agent()
            .map_err(|e| bad_request("InvalidFault", e.to_string()))?;
    }

    let result = state.agent.invoke(&request, ctx).await;
    if let Some(span) = &result.span {
        state.sink.emit(span.clone());
    }

    Ok((status_code(&result), Json(result)).into_response())
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
