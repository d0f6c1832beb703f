//! Per-hop fault injection.
//!
//! The injector sits where a hop would do its real work. It classifies the
//! task, decides whether the directive fires and then either runs the tool
//! through the caller-supplied `proceed` closure, runs it with an altered
//! intercept, or short-circuits with a simulated outcome.

use agent_trace::Span;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::directive::{FaultDirective, FaultKind};

/// A concrete tool selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// The tools one hop can choose between.
pub trait Toolbox: Send + Sync {
    /// Nominally correct tool for `task`.
    fn classify(&self, task: &str, location: &str) -> ToolCall;

    /// A tool deterministically different from `call`.
    fn alternate(&self, call: &ToolCall) -> ToolCall;

    /// Plausible payload produced without running any tool.
    fn fabricate(&self, location: &str) -> Value;

    /// `call` pointed at another city's data, `city` when given. `None`
    /// when the tools have no notion of a foreign listing.
    fn relocate(&self, _call: &ToolCall, _city: Option<&str>) -> Option<ToolCall> {
        None
    }

    /// `payload` with every listing removed. `None` when there is nothing
    /// to empty.
    fn hollow(&self, _payload: &Value) -> Option<Value> {
        None
    }
}

/// How `proceed` should run the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intercept {
    /// Run the tool normally.
    Run,
    /// Hang for the given duration, then fail as a timeout.
    Stall(Duration),
}

/// Classification of a simulated failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    Timeout,
    ToolError,
    RateLimited,
}

impl FaultClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultClass::Timeout => "timeout",
            FaultClass::ToolError => "tool_error",
            FaultClass::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for FaultClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure produced by the harness. Always data, never a panic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedFault {
    pub class: FaultClass,
    pub message: String,
}

impl SimulatedFault {
    pub fn timeout(tool: &str, after: Duration) -> Self {
        Self {
            class: FaultClass::Timeout,
            message: format!("Tool '{}' timed out after {}ms", tool, after.as_millis()),
        }
    }

    pub fn tool_error(tool: &str) -> Self {
        Self {
            class: FaultClass::ToolError,
            message: format!("Tool '{}' failed: External API returned 503", tool),
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            class: FaultClass::RateLimited,
            message: "Rate limit exceeded. Retry after 60 seconds.".to_string(),
        }
    }
}

/// Result of running one tool through `proceed`.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub call: ToolCall,
    pub result: Result<Value, SimulatedFault>,
    /// Closed `execute_tool` span.
    pub span: Span,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
}

/// Successful hop output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopOutput {
    pub payload: Value,
    pub finish_reason: FinishReason,
}

/// Everything the injector did for one hop.
#[derive(Debug, Clone)]
pub struct Injection {
    /// Fault that actually fired; `None` when the directive was absent,
    /// `none`, or lost its probability draw.
    pub fault: Option<FaultKind>,
    /// Tool picked by intent classification.
    pub classified: ToolCall,
    /// Tool actually run, with its span.
    pub execution: Option<ToolExecution>,
    pub outcome: Result<HopOutput, SimulatedFault>,
}

impl Injection {
    pub fn tool_invoked(&self) -> bool {
        self.execution.is_some()
    }
}

/// Injector tuning.
#[derive(Debug, Clone)]
pub struct InjectorConfig {
    /// Default sleep for `high_latency`
    pub default_delay: Duration,
    /// How long `tool_timeout` stalls; should exceed the caller's budget
    pub timeout_stall: Duration,
    /// Default truncation limit for `token_limit_exceeded`
    pub default_max_chars: usize,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_millis(3000),
            timeout_stall: Duration::from_millis(35_000),
            default_max_chars: 48,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FaultInjector {
    config: InjectorConfig,
}

impl FaultInjector {
    pub fn new(config: InjectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Apply `directive` to one hop.
    ///
    /// `proceed` runs a tool under the given intercept and returns its
    /// execution record; it is called at most once.
    pub async fn apply<F, Fut>(
        &self,
        directive: Option<&FaultDirective>,
        toolbox: &dyn Toolbox,
        task: &str,
        location: &str,
        proceed: F,
    ) -> Injection
    where
        F: FnOnce(ToolCall, Intercept) -> Fut,
        Fut: Future<Output = ToolExecution>,
    {
        let classified = toolbox.classify(task, location);

        let fired = directive.filter(|d| {
            let fires = d.fires(rand::random::<f64>());
            if !fires && d.kind != FaultKind::None {
                debug!(fault = %d.kind, probability = d.probability(), "Fault draw missed");
            }
            fires
        });

        let Some(directive) = fired else {
            return Self::run(None, classified.clone(), classified, Intercept::Run, proceed).await;
        };
        let kind = directive.kind;

        match kind {
            FaultKind::None | FaultKind::PartialFailure | FaultKind::FanOutTimeout => {
                Self::run(None, classified.clone(), classified, Intercept::Run, proceed).await
            }
            FaultKind::HighLatency => {
                if !directive.targets_tool(&classified.name) {
                    return Self::run(None, classified.clone(), classified, Intercept::Run, proceed)
                        .await;
                }
                let delay = directive
                    .params
                    .delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.default_delay);
                info!(fault = %kind, delay_ms = delay.as_millis() as u64, "Injecting latency");
                tokio::time::sleep(delay).await;
                Self::run(Some(kind), classified.clone(), classified, Intercept::Run, proceed).await
            }
            FaultKind::ToolTimeout => {
                if !directive.targets_tool(&classified.name) {
                    return Self::run(None, classified.clone(), classified, Intercept::Run, proceed)
                        .await;
                }
                let stall = directive
                    .params
                    .delay_ms
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis)
                    .unwrap_or(self.config.timeout_stall);
                info!(fault = %kind, stall_ms = stall.as_millis() as u64, tool = %classified.name, "Injecting tool stall");
                Self::run(
                    Some(kind),
                    classified.clone(),
                    classified,
                    Intercept::Stall(stall),
                    proceed,
                )
                .await
            }
            FaultKind::ToolError => {
                info!(fault = %kind, tool = %classified.name, "Injecting tool error");
                let fault = SimulatedFault::tool_error(&classified.name);
                Self::short_circuit(kind, classified, Err(fault))
            }
            FaultKind::RateLimited => {
                info!(fault = %kind, "Injecting rate limit");
                Self::short_circuit(kind, classified, Err(SimulatedFault::rate_limited()))
            }
            FaultKind::Hallucination => {
                info!(fault = %kind, "Fabricating payload without tool call");
                let output = HopOutput {
                    payload: toolbox.fabricate(location),
                    finish_reason: FinishReason::Stop,
                };
                Self::short_circuit(kind, classified, Ok(output))
            }
            FaultKind::WrongTool => {
                let wrong = toolbox.alternate(&classified);
                info!(fault = %kind, intended = %classified.name, selected = %wrong.name, "Swapping tool");
                Self::run(Some(kind), classified, wrong, Intercept::Run, proceed).await
            }
            FaultKind::WrongCity => {
                let city = directive.params.wrong_city.as_deref();
                match toolbox.relocate(&classified, city) {
                    Some(moved) => {
                        info!(fault = %kind, tool = %moved.name, arguments = %moved.arguments, "Serving another city's data");
                        Self::run(Some(kind), classified, moved, Intercept::Run, proceed).await
                    }
                    None => {
                        debug!(fault = %kind, tool = %classified.name, "Tool has no foreign listings");
                        Self::run(None, classified.clone(), classified, Intercept::Run, proceed).await
                    }
                }
            }
            FaultKind::Empty => {
                let execution = proceed(classified.clone(), Intercept::Run).await;
                let hollowed = execution
                    .result
                    .as_ref()
                    .ok()
                    .and_then(|payload| toolbox.hollow(payload));
                let fault = hollowed.is_some().then_some(kind);
                if fault.is_some() {
                    info!(fault = %kind, tool = %classified.name, "Emptied tool output");
                }
                let outcome = match hollowed {
                    Some(payload) => Ok(payload),
                    None => execution.result.clone(),
                }
                .map(|payload| HopOutput {
                    payload,
                    finish_reason: FinishReason::Stop,
                });
                Injection {
                    fault,
                    classified,
                    execution: Some(execution),
                    outcome,
                }
            }
            FaultKind::TokenLimitExceeded => {
                let max_chars = directive
                    .params
                    .max_chars
                    .unwrap_or(self.config.default_max_chars);
                let execution = proceed(classified.clone(), Intercept::Run).await;
                let outcome = execution.result.clone().map(|payload| HopOutput {
                    payload: truncate_payload(&payload, max_chars),
                    finish_reason: FinishReason::Length,
                });
                info!(fault = %kind, max_chars, "Truncated tool output");
                Injection {
                    fault: Some(kind),
                    classified,
                    execution: Some(execution),
                    outcome,
                }
            }
        }
    }

    async fn run<F, Fut>(
        fault: Option<FaultKind>,
        classified: ToolCall,
        selected: ToolCall,
        intercept: Intercept,
        proceed: F,
    ) -> Injection
    where
        F: FnOnce(ToolCall, Intercept) -> Fut,
        Fut: Future<Output = ToolExecution>,
    {
        let execution = proceed(selected, intercept).await;
        let outcome = execution.result.clone().map(|payload| HopOutput {
            payload,
            finish_reason: FinishReason::Stop,
        });
        Injection {
            fault,
            classified,
            execution: Some(execution),
            outcome,
        }
    }

    fn short_circuit(
        kind: FaultKind,
        classified: ToolCall,
        outcome: Result<HopOutput, SimulatedFault>,
    ) -> Injection {
        Injection {
            fault: Some(kind),
            classified,
            execution: None,
            outcome,
        }
    }
}

/// Cut a payload down as a length-limited completion would.
///
/// Strings longer than `max_chars` are cut and end in an em dash, arrays
/// keep their first element, objects are truncated field by field.
pub fn truncate_payload(value: &Value, max_chars: usize) -> Value {
    match value {
        Value::String(s) if s.chars().count() > max_chars => {
            let mut cut: String = s.chars().take(max_chars).collect();
            cut.push('\u{2014}');
            Value::String(cut)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(1)
                .map(|v| truncate_payload(v, max_chars))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), truncate_payload(v, max_chars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_trace::{SpanKind, TraceContext};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Pair;

    impl Toolbox for Pair {
        fn classify(&self, task: &str, location: &str) -> ToolCall {
            let name = if task.contains("list") { "list" } else { "lookup" };
            ToolCall::new(name, json!({ "location": location }))
        }

        fn alternate(&self, call: &ToolCall) -> ToolCall {
            let name = if call.name == "lookup" { "list" } else { "lookup" };
            ToolCall::new(name, call.arguments.clone())
        }

        fn fabricate(&self, location: &str) -> Value {
            json!({ "location": location, "made_up": true })
        }
    }

    /// Like `Pair`, with per-city listings.
    struct Listings;

    impl Toolbox for Listings {
        fn classify(&self, task: &str, location: &str) -> ToolCall {
            Pair.classify(task, location)
        }

        fn alternate(&self, call: &ToolCall) -> ToolCall {
            Pair.alternate(call)
        }

        fn fabricate(&self, location: &str) -> Value {
            Pair.fabricate(location)
        }

        fn relocate(&self, call: &ToolCall, city: Option<&str>) -> Option<ToolCall> {
            let mut arguments = call.arguments.clone();
            arguments["source"] = json!(city.unwrap_or("Lyon"));
            Some(ToolCall::new(call.name.clone(), arguments))
        }

        fn hollow(&self, payload: &Value) -> Option<Value> {
            let mut payload = payload.clone();
            payload["items"] = json!([]);
            Some(payload)
        }
    }

    async fn run_tool(calls: &AtomicUsize, call: ToolCall, intercept: Intercept) -> ToolExecution {
        calls.fetch_add(1, Ordering::SeqCst);
        let mut span = Span::start(
            TraceContext::root(),
            format!("execute_tool {}", call.name),
            SpanKind::Internal,
        );
        let result = match intercept {
            Intercept::Run => Ok(json!({
                "tool": call.name,
                "summary": "a long description of the current conditions downtown",
                "items": [1, 2, 3],
            })),
            Intercept::Stall(d) => {
                tokio::time::sleep(d).await;
                Err(SimulatedFault::timeout(&call.name, d))
            }
        };
        match &result {
            Ok(_) => span.end_ok(),
            Err(f) => span.end_error(f.class.as_str()),
        }
        ToolExecution { call, result, span }
    }

    async fn apply(directive: Option<FaultDirective>, task: &str) -> (Injection, usize) {
        apply_with(&Pair, directive, task).await
    }

    async fn apply_with(
        toolbox: &dyn Toolbox,
        directive: Option<FaultDirective>,
        task: &str,
    ) -> (Injection, usize) {
        let calls = AtomicUsize::new(0);
        let injector = FaultInjector::new(InjectorConfig {
            default_delay: Duration::from_millis(5),
            timeout_stall: Duration::from_millis(5),
            default_max_chars: 10,
        });
        let injection = injector
            .apply(directive.as_ref(), toolbox, task, "Paris", |call, intercept| {
                run_tool(&calls, call, intercept)
            })
            .await;
        (injection, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_no_directive_runs_tool() {
        let (injection, calls) = apply(None, "lookup Paris").await;
        assert_eq!(calls, 1);
        assert!(injection.fault.is_none());
        assert_eq!(injection.execution.unwrap().call.name, "lookup");
        assert_eq!(injection.outcome.unwrap().finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_tool_error_skips_tool() {
        let (injection, calls) = apply(Some(FaultKind::ToolError.into()), "lookup").await;
        assert_eq!(calls, 0);
        assert_eq!(injection.fault, Some(FaultKind::ToolError));
        assert_eq!(injection.outcome.unwrap_err().class, FaultClass::ToolError);
    }

    #[tokio::test]
    async fn test_rate_limited_skips_tool() {
        let (injection, calls) = apply(Some(FaultKind::RateLimited.into()), "lookup").await;
        assert_eq!(calls, 0);
        assert_eq!(injection.outcome.unwrap_err().class, FaultClass::RateLimited);
    }

    #[tokio::test]
    async fn test_hallucination_fabricates_without_tool() {
        let (injection, calls) = apply(Some(FaultKind::Hallucination.into()), "lookup").await;
        assert_eq!(calls, 0);
        assert!(!injection.tool_invoked());
        let output = injection.outcome.unwrap();
        assert_eq!(output.payload["made_up"], true);
    }

    #[tokio::test]
    async fn test_wrong_tool_differs_from_classified() {
        let (injection, calls) = apply(Some(FaultKind::WrongTool.into()), "lookup").await;
        assert_eq!(calls, 1);
        let execution = injection.execution.unwrap();
        assert_eq!(injection.classified.name, "lookup");
        assert_eq!(execution.call.name, "list");
    }

    #[tokio::test]
    async fn test_wrong_city_runs_tool_against_other_city() {
        let directive = FaultDirective::new(FaultKind::WrongCity).with_wrong_city("Tokyo");
        let (injection, calls) = apply_with(&Listings, Some(directive), "lookup").await;
        assert_eq!(calls, 1);
        assert_eq!(injection.fault, Some(FaultKind::WrongCity));
        let execution = injection.execution.unwrap();
        assert_eq!(execution.call.name, "lookup");
        assert_eq!(execution.call.arguments["source"], "Tokyo");
        assert_eq!(execution.call.arguments["location"], "Paris");
        assert!(injection.outcome.is_ok());

        let (injection, _) = apply_with(&Listings, Some(FaultKind::WrongCity.into()), "lookup").await;
        assert_eq!(injection.execution.unwrap().call.arguments["source"], "Lyon");
    }

    #[tokio::test]
    async fn test_empty_runs_tool_then_drops_listings() {
        let (injection, calls) = apply_with(&Listings, Some(FaultKind::Empty.into()), "lookup").await;
        assert_eq!(calls, 1);
        assert_eq!(injection.fault, Some(FaultKind::Empty));
        assert!(injection.tool_invoked());
        let output = injection.outcome.unwrap();
        assert_eq!(output.payload["items"], json!([]));
        assert_eq!(output.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_listing_faults_without_listings_proceed_unmodified() {
        for kind in [FaultKind::WrongCity, FaultKind::Empty] {
            let (injection, calls) = apply(Some(kind.into()), "lookup").await;
            assert_eq!(calls, 1);
            assert!(injection.fault.is_none());
            assert_eq!(injection.outcome.unwrap().payload["items"], json!([1, 2, 3]));
        }
    }

    #[tokio::test]
    async fn test_tool_timeout_stalls_then_fails() {
        let (injection, calls) = apply(Some(FaultKind::ToolTimeout.into()), "lookup").await;
        assert_eq!(calls, 1);
        assert_eq!(injection.outcome.unwrap_err().class, FaultClass::Timeout);
        assert_eq!(
            injection.execution.unwrap().span.status,
            agent_trace::SpanStatus::Error
        );
    }

    #[tokio::test]
    async fn test_tool_timeout_for_other_tool_is_ignored() {
        let directive = FaultDirective::new(FaultKind::ToolTimeout).with_tool("list");
        let (injection, _) = apply(Some(directive), "lookup").await;
        assert!(injection.fault.is_none());
        assert!(injection.outcome.is_ok());
    }

    #[tokio::test]
    async fn test_high_latency_delays_then_succeeds() {
        let directive = FaultDirective::new(FaultKind::HighLatency).with_delay_ms(20);
        let started = std::time::Instant::now();
        let (injection, calls) = apply(Some(directive), "lookup").await;
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(calls, 1);
        assert_eq!(injection.fault, Some(FaultKind::HighLatency));
        assert!(injection.outcome.is_ok());
    }

    #[tokio::test]
    async fn test_token_limit_truncates() {
        let (injection, calls) = apply(Some(FaultKind::TokenLimitExceeded.into()), "lookup").await;
        assert_eq!(calls, 1);
        let output = injection.outcome.unwrap();
        assert_eq!(output.finish_reason, FinishReason::Length);
        assert_eq!(output.payload["items"], json!([1]));
        assert_eq!(output.payload["summary"], json!("a long des\u{2014}"));
    }

    #[tokio::test]
    async fn test_orchestrator_only_kinds_proceed_unmodified() {
        for kind in [FaultKind::PartialFailure, FaultKind::FanOutTimeout] {
            let (injection, calls) = apply(Some(kind.into()), "lookup").await;
            assert_eq!(calls, 1);
            assert!(injection.fault.is_none());
            assert!(injection.outcome.is_ok());
        }
    }

    #[tokio::test]
    async fn test_zero_probability_never_fires() {
        let directive = FaultDirective::new(FaultKind::ToolError).with_probability(0.0);
        let (injection, calls) = apply(Some(directive), "lookup").await;
        assert_eq!(calls, 1);
        assert!(injection.fault.is_none());
    }

    #[test]
    fn test_truncate_leaves_short_values() {
        let value = json!({"temp": 12, "cond": "sunny", "tags": []});
        assert_eq!(truncate_payload(&value, 48), value);
    }
}
