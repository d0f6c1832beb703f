//! Integration tests for the travel planner

use agent_faults::{FaultDirective, FaultKind, InjectorConfig};
use agent_trace::{inject, MemorySink, SpanSink, SpanStatus, TraceContext, TraceHeaders, TraceTree};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sub_agent::engine::{EngineConfig, SubAgent};
use sub_agent::{InvokeRequest, Profile, SubAgentResult};
use tower::ServiceExt;
use travel_planner::client::{ClientError, PlannerClient};
use travel_planner::engine::{CallFuture, LocalCaller, SubAgentCaller};
use travel_planner::handler::{create_router, AppState};
use travel_planner::telemetry::MetricsRegistry;
use travel_planner::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sub_agent(profile: Profile, tool_latency: Duration) -> SubAgent {
    SubAgent::with_config(
        profile,
        EngineConfig {
            tool_latency,
            injector: InjectorConfig {
                default_delay: Duration::from_millis(5),
                timeout_stall: Duration::from_millis(5),
                default_max_chars: 48,
            },
        },
    )
}

fn local_planner(config: PlannerConfig, sink: Arc<MemorySink>, tool_latency: Duration) -> Planner {
    Planner::new(config)
        .with_agent(
            "weather",
            Arc::new(LocalCaller::new(sub_agent(Profile::Weather, tool_latency), sink.clone())),
        )
        .with_agent(
            "events",
            Arc::new(LocalCaller::new(sub_agent(Profile::Events, tool_latency), sink)),
        )
}

fn planner(sink: Arc<MemorySink>) -> Planner {
    local_planner(PlannerConfig::default(), sink, Duration::ZERO)
}

fn test_app() -> (axum::Router, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let state = Arc::new(AppState::new(planner(sink.clone()), sink.clone(), metrics));
    (create_router(state), sink)
}

async fn post_plan(app: axum::Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/plan")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Answers after `delay`, regardless of the request.
struct Slow(Duration);

impl SubAgentCaller for Slow {
    fn call(&self, _request: InvokeRequest, _trace: TraceHeaders) -> CallFuture<'_> {
        let delay = self.0;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            let agent = SubAgent::new(Profile::Weather);
            Ok(agent
                .invoke(&InvokeRequest::new("Weather in Paris"), TraceContext::root())
                .await)
        })
    }
}

#[tokio::test]
async fn test_plan_without_faults_is_complete() {
    let outcome = planner(Arc::new(MemorySink::new()))
        .plan(&PlanRequest::new("Paris"), TraceContext::root())
        .await
        .unwrap();

    let response = outcome.response;
    assert!(!response.partial);
    assert!(response.errors.is_empty());
    assert!(response.results.contains_key("weather"));
    assert!(response.results.contains_key("events"));
    assert!(response.recommendation.starts_with("Great choice! Paris looks wonderful."));
    assert_eq!(outcome.span.status, SpanStatus::Ok);
}

#[tokio::test]
async fn test_failed_agent_is_reported_and_sibling_kept() {
    let request = PlanRequest::new("Paris").with_agent_fault(
        "events",
        serde_json::from_value(json!({"type": "error"})).unwrap(),
    );

    let outcome = planner(Arc::new(MemorySink::new()))
        .plan(&request, TraceContext::root())
        .await
        .unwrap();

    let response = outcome.response;
    assert!(response.partial);
    assert!(!response.results.contains_key("events"));
    assert!(response.results.contains_key("weather"));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].agent_name, "events");
    assert_eq!(response.errors[0].kind, ErrorKind::Error);
    assert!(response.errors[0].detail.starts_with("tool_error"));
    assert!(response.recommendation.contains("Events info temporarily unavailable."));

    assert_eq!(outcome.span.status, SpanStatus::Error);
    assert_eq!(
        outcome.span.status_message.as_deref(),
        Some("Partial failure: 1 sub-agent(s) failed")
    );
}

#[tokio::test]
async fn test_partial_failure_skips_each_agent_about_half_the_time() {
    let planner = planner(Arc::new(MemorySink::new()));
    let request = PlanRequest::new("Paris").with_orchestrator_fault(FaultKind::PartialFailure.into());

    let mut weather_skipped = 0;
    let mut events_skipped = 0;

    for _ in 0..1000 {
        let response = planner
            .plan(&request, TraceContext::root())
            .await
            .unwrap()
            .response;

        assert!(response.partial);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].kind, ErrorKind::Skipped);
        assert_eq!(response.results.len(), 1);

        match response.errors[0].agent_name.as_str() {
            "weather" => weather_skipped += 1,
            "events" => events_skipped += 1,
            other => panic!("unexpected agent {}", other),
        }
    }

    assert_eq!(weather_skipped + events_skipped, 1000);
    assert!((400..=600).contains(&weather_skipped), "weather skipped {}", weather_skipped);
    assert!((400..=600).contains(&events_skipped), "events skipped {}", events_skipped);
}

#[tokio::test]
async fn test_slow_sibling_times_out_alone() {
    let config = PlannerConfig {
        call_timeout: Duration::from_millis(100),
        ..PlannerConfig::default()
    };
    let sink = Arc::new(MemorySink::new());
    let planner = Planner::new(config)
        .with_agent("weather", Arc::new(Slow(Duration::from_secs(5))))
        .with_agent(
            "events",
            Arc::new(LocalCaller::new(sub_agent(Profile::Events, Duration::ZERO), sink)),
        );

    let started = Instant::now();
    let response = planner
        .plan(&PlanRequest::new("Tokyo"), TraceContext::root())
        .await
        .unwrap()
        .response;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(response.partial);
    assert!(response.results.contains_key("events"));
    assert_eq!(response.error_for("weather").unwrap().kind, ErrorKind::Timeout);
    assert!(response.error_for("events").is_none());
}

#[tokio::test]
async fn test_tool_timeout_does_not_slow_sibling() {
    let config = PlannerConfig {
        call_timeout: Duration::from_millis(200),
        ..PlannerConfig::default()
    };
    let sink = Arc::new(MemorySink::new());
    let stalling_weather = SubAgent::with_config(
        Profile::Weather,
        EngineConfig {
            tool_latency: Duration::ZERO,
            injector: InjectorConfig {
                timeout_stall: Duration::from_secs(5),
                ..InjectorConfig::default()
            },
        },
    );
    let planner = Planner::new(config)
        .with_agent("weather", Arc::new(LocalCaller::new(stalling_weather, sink.clone())))
        .with_agent(
            "events",
            Arc::new(LocalCaller::new(sub_agent(Profile::Events, Duration::ZERO), sink)),
        );
    let request = PlanRequest::new("Sydney").with_agent_fault("weather", FaultKind::ToolTimeout.into());

    let started = Instant::now();
    let outcome = planner.plan(&request, TraceContext::root()).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    let response = outcome.response;
    assert_eq!(response.error_for("weather").unwrap().kind, ErrorKind::Timeout);
    assert!(response.error_for("events").is_none());
    assert!(response.results.contains_key("events"));

    let events_calls = outcome.span.children_named("call_agent events");
    assert_eq!(events_calls.len(), 1);
    let events_ms = events_calls[0].duration_ms.unwrap();
    assert!(events_ms < 100, "events call took {}ms", events_ms);
}

#[tokio::test]
async fn test_fan_out_timeout_fails_every_call() {
    let planner = local_planner(
        PlannerConfig::default(),
        Arc::new(MemorySink::new()),
        Duration::from_millis(50),
    );
    let request = PlanRequest::new("Berlin").with_orchestrator_fault(FaultKind::FanOutTimeout.into());

    let response = planner
        .plan(&request, TraceContext::root())
        .await
        .unwrap()
        .response;

    assert!(response.partial);
    assert!(response.results.is_empty());
    assert_eq!(response.errors.len(), 2);
    assert!(response.errors.iter().all(|e| e.kind == ErrorKind::Timeout));
    assert_eq!(response.errors[0].agent_name, "weather");
    assert_eq!(response.errors[1].agent_name, "events");
}

#[tokio::test]
async fn test_orchestrator_high_latency_delays_plan() {
    let planner = planner(Arc::new(MemorySink::new()));
    let request = PlanRequest::new("Rome")
        .with_orchestrator_fault(FaultDirective::new(FaultKind::HighLatency).with_delay_ms(100));

    let started = Instant::now();
    let outcome = planner.plan(&request, TraceContext::root()).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert!(!outcome.response.partial);
    assert_eq!(
        outcome.span.attribute("fault.orchestrator"),
        Some(&json!("high_latency"))
    );
}

#[tokio::test]
async fn test_all_agents_failing_still_returns_plan() {
    let (app, _) = test_app();
    let (code, reply) = post_plan(
        app,
        json!({
            "destination": "Sydney",
            "fault": {"weather": "rate_limited", "events": {"type": "tool_error"}}
        }),
    )
    .await;

    assert_eq!(code, StatusCode::OK);
    assert_eq!(reply["partial"], true);
    assert_eq!(reply["results"], json!({}));
    assert_eq!(reply["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_one_trace_spans_every_service() {
    let sink = Arc::new(MemorySink::new());
    let planner = planner(sink.clone());
    let caller = TraceContext::root();

    let outcome = planner
        .plan(&PlanRequest::new("London"), caller)
        .await
        .unwrap();
    sink.emit(outcome.span);

    let tree = TraceTree::from_spans(sink.take());
    assert_eq!(tree.verify().unwrap(), caller.trace_id);

    let roots = tree.named("invoke_agent travel-planner");
    let root = roots[0];
    let clients = tree.named("call_agent");
    assert_eq!(clients.len(), 2);
    for client in &clients {
        assert_eq!(client.context.parent_span_id, Some(root.context.span_id));
        let servers = tree.children_of(client.context.span_id);
        assert_eq!(servers.len(), 1);
        assert!(servers[0].name.starts_with("invoke_agent "));
    }
    assert_eq!(tree.named("execute_tool").len(), 2);
}

#[tokio::test]
async fn test_handler_continues_incoming_trace() {
    let (app, sink) = test_app();
    let caller = TraceContext::root();
    let headers = inject(&caller);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/plan")
                .header("content-type", "application/json")
                .header("traceparent", headers.traceparent.as_str())
                .body(Body::from(json!({"destination": "Paris"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let reply: PlanResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(reply.trace_id, caller.trace_id.to_hex());

    // Two sub-agent trees plus the planner's own, all under the caller.
    let tree = TraceTree::from_spans(sink.take());
    assert_eq!(tree.len(), 7);
    assert!(tree.spans().iter().all(|s| s.context.trace_id == caller.trace_id));
    let roots = tree.named("invoke_agent travel-planner");
    assert_eq!(roots[0].context.parent_span_id, Some(caller.span_id));
}

#[tokio::test]
async fn test_validation_failures_return_400() {
    let bodies = [
        json!({"destination": ""}),
        json!({"destination": "Paris", "fault": {"traffic": "tool_error"}}),
        json!({"destination": "Paris", "fault": {"events": "fan_out_timeout"}}),
        json!({"destination": "Paris", "fault": {"orchestrator": "hallucination"}}),
        json!({"destination": "Paris", "fault": {"weather": {"type": "error", "probability": -1}}}),
        json!({"fault": {}}),
    ];

    for body in bodies {
        let (app, sink) = test_app();
        let (code, reply) = post_plan(app, body.clone()).await;

        assert_eq!(code, StatusCode::BAD_REQUEST, "body {}", body);
        assert!(reply["error"].is_string());
        assert!(sink.spans().is_empty(), "no span for rejected input");
    }
}

#[tokio::test]
async fn test_metrics_endpoint_counts_plans() {
    let sink = Arc::new(MemorySink::new());
    let metrics = Arc::new(MetricsRegistry::new().unwrap());
    let state = Arc::new(AppState::new(planner(sink.clone()), sink, metrics));

    let (code, _) = post_plan(
        create_router(state.clone()),
        json!({"destination": "Paris", "fault": {"events": "tool_error"}}),
    )
    .await;
    assert_eq!(code, StatusCode::OK);

    let response = create_router(state)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("plan_requests_total{outcome=\"partial\"} 1"));
    assert!(text.contains("subagent_calls_total{agent=\"events\",status=\"error\"} 1"));
    assert!(text.contains("subagent_calls_total{agent=\"weather\",status=\"ok\"} 1"));
    assert!(text.contains("plans_in_flight 0"));
}

#[tokio::test]
async fn test_health_lists_sub_agents() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.agent_id, "travel-planner-001");
    assert_eq!(health.sub_agents, vec!["weather", "events"]);
}

#[tokio::test]
async fn test_http_sub_agent_fault_reply_is_folded_in() {
    let server = MockServer::start().await;
    let reply = SubAgentResult::unanswered(
        "weather",
        sub_agent::AgentStatus::Error,
        "rate_limited",
        "Rate limit exceeded. Retry after 60 seconds.",
    );

    Mock::given(method("POST"))
        .and(path("/invoke"))
        .respond_with(ResponseTemplate::new(429).set_body_json(&reply))
        .mount(&server)
        .await;

    let planner = Planner::new(PlannerConfig::default()).with_agent(
        "weather",
        Arc::new(travel_planner::engine::HttpCaller::new(
            sub_agent::client::SubAgentClient::new(server.uri()),
        )),
    );

    let response = planner
        .plan(&PlanRequest::new("Paris"), TraceContext::root())
        .await
        .unwrap()
        .response;

    let error = response.error_for("weather").unwrap();
    assert_eq!(error.kind, ErrorKind::Error);
    assert_eq!(
        error.detail,
        "rate_limited: Rate limit exceeded. Retry after 60 seconds."
    );
}

#[tokio::test]
async fn test_planner_client_reports_validation_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/plan"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "InvalidInput",
            "message": "destination must not be empty",
            "request_id": null
        })))
        .mount(&server)
        .await;

    let client = PlannerClient::new(server.uri());
    let err = client.plan(&PlanRequest::new(""), None).await.unwrap_err();

    match err {
        ClientError::Server { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "destination must not be empty");
        }
        other => panic!("unexpected error {:?}", other),
    }
}
