//! Invocation engine
//!
//! Runs one task through the fault injector and the profile's tools, and
//! records what happened as an `invoke_agent` span with at most one
//! `execute_tool` child.

use agent_faults::{
    FaultClass, FaultInjector, InjectorConfig, Intercept, SimulatedFault, ToolCall, ToolExecution,
    Toolbox,
};
use agent_trace::{Span, SpanKind, TraceContext};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::contracts::*;
use crate::profiles::{events, extract_location, Profile};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulated latency of every real tool call
    pub tool_latency: Duration,

    pub injector: InjectorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tool_latency: Duration::ZERO,
            injector: InjectorConfig::default(),
        }
    }
}

pub struct SubAgent {
    profile: Profile,
    injector: FaultInjector,
    tool_latency: Duration,
}

impl SubAgent {
    pub fn new(profile: Profile) -> Self {
        Self::with_config(profile, EngineConfig::default())
    }

    pub fn with_config(profile: Profile, config: EngineConfig) -> Self {
        Self {
            profile,
            injector: FaultInjector::new(config.injector),
            tool_latency: config.tool_latency,
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Serve one invocation under `ctx`, the server-side context of this hop.
    ///
    /// Injected faults come back as data in the result; nothing here fails.
    pub async fn invoke(&self, request: &InvokeRequest, ctx: TraceContext) -> SubAgentResult {
        let started = Instant::now();
        let agent_name = self.profile.agent_name();
        let location = request
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| extract_location(&request.message));

        let mut span = Span::start(ctx, format!("invoke_agent {}", agent_name), SpanKind::Server)
            .with_attribute("gen_ai.operation.name", "invoke_agent")
            .with_attribute("gen_ai.agent.id", self.profile.agent_id())
            .with_attribute("gen_ai.agent.name", self.profile.display_name())
            .with_attribute("location", location.clone());
        if let Some(conversation) = &request.conversation_id {
            span.set_attribute("gen_ai.conversation.id", conversation.clone());
        }
        if let Some(fault) = &request.fault {
            span.set_attribute("fault.requested", fault.kind.as_str());
        }

        let tool_ctx = span.child_context();
        let injection = self
            .injector
            .apply(
                request.fault.as_ref(),
                &self.profile,
                &request.message,
                &location,
                |call, intercept| self.run_tool(tool_ctx, call, intercept),
            )
            .await;

        span.set_attribute("tool.classified", injection.classified.name.clone());
        if let Some(kind) = injection.fault {
            span.set_attribute("fault.injected", kind.as_str());
        }

        let mut tool = None;
        if let Some(execution) = injection.execution {
            span.set_attribute("gen_ai.tool.name", execution.call.name.clone());
            if let Some(source) = execution.call.arguments[events::LISTINGS_FROM].as_str() {
                span.set_attribute("fault.wrong_city", source.to_string());
            }
            tool = Some(execution.call.name);
            span.add_child(execution.span);
        }

        let mut result = SubAgentResult {
            agent_name: agent_name.to_string(),
            status: AgentStatus::Ok,
            payload: None,
            error_detail: None,
            error_message: None,
            classified_tool: Some(injection.classified.name),
            tool,
            finish_reason: None,
            fault_injected: injection.fault,
            span: None,
        };

        match injection.outcome {
            Ok(output) => {
                span.set_attribute(
                    "gen_ai.response.finish_reasons",
                    serde_json::json!([output.finish_reason]),
                );
                span.end_ok();
                result.payload = Some(output.payload);
                result.finish_reason = Some(output.finish_reason);
            }
            Err(fault) => {
                span.set_attribute("error.type", fault.class.as_str());
                span.end_error(fault.class.as_str());
                result.status = match fault.class {
                    FaultClass::Timeout => AgentStatus::Timeout,
                    FaultClass::ToolError | FaultClass::RateLimited => AgentStatus::Error,
                };
                result.error_detail = Some(fault.class.as_str().to_string());
                result.error_message = Some(fault.message);
            }
        }

        info!(
            agent = agent_name,
            trace_id = %span.context.trace_id,
            status = ?result.status,
            tool = result.tool.as_deref().unwrap_or("-"),
            fault = result.fault_injected.map(|k| k.as_str()).unwrap_or("-"),
            duration_ms = started.elapsed().as_millis() as u64,
            "Invocation complete"
        );

        result.span = Some(span);
        result
    }

    async fn run_tool(
        &self,
        ctx: TraceContext,
        call: ToolCall,
        intercept: Intercept,
    ) -> ToolExecution {
        let mut span = Span::start(ctx, format!("execute_tool {}", call.name), SpanKind::Internal)
            .with_attribute("gen_ai.operation.name", "execute_tool")
            .with_attribute("gen_ai.tool.name", call.name.clone())
            .with_attribute("gen_ai.tool.call.arguments", call.arguments.to_string());

        let result = match intercept {
            Intercept::Run => {
                if !self.tool_latency.is_zero() {
                    tokio::time::sleep(self.tool_latency).await;
                }
                self.profile.execute(&call).ok_or_else(|| {
                    warn!(tool = %call.name, "Tool not available in this profile");
                    SimulatedFault::tool_error(&call.name)
                })
            }
            Intercept::Stall(stall) => {
                tokio::time::sleep(stall).await;
                Err(SimulatedFault::timeout(&call.name, stall))
            }
        };

        match &result {
            Ok(_) => span.end_ok(),
            Err(fault) => {
                span.set_attribute("error.type", fault.class.as_str());
                span.end_error(fault.message.clone());
            }
        }

        ToolExecution { call, result, span }
    }
}
