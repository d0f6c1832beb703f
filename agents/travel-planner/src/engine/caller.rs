//! Transports for fan-out calls.

use agent_trace::{extract_traceparent, SpanSink, TraceHeaders};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use sub_agent::client::{ClientError, SubAgentClient};
use sub_agent::engine::SubAgent;
use sub_agent::{InvokeRequest, SubAgentResult};

pub type CallFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SubAgentResult, ClientError>> + Send + 'a>>;

/// One way of reaching a sub-agent
pub trait SubAgentCaller: Send + Sync {
    /// Invoke the sub-agent with the given trace headers attached.
    fn call(&self, request: InvokeRequest, trace: TraceHeaders) -> CallFuture<'_>;
}

/// Calls a sub-agent over HTTP
pub struct HttpCaller {
    client: SubAgentClient,
}

impl HttpCaller {
    pub fn new(client: SubAgentClient) -> Self {
        Self { client }
    }
}

impl SubAgentCaller for HttpCaller {
    fn call(&self, request: InvokeRequest, trace: TraceHeaders) -> CallFuture<'_> {
        Box::pin(async move { self.client.invoke(&request, &trace).await })
    }
}

/// Runs a sub-agent in-process.
///
/// Behaves like the remote service: continues the trace from the headers
/// and emits the invocation span to its own sink.
pub struct LocalCaller {
    agent: SubAgent,
    sink: Arc<dyn SpanSink>,
}

impl LocalCaller {
    pub fn new(agent: SubAgent, sink: Arc<dyn SpanSink>) -> Self {
        Self { agent, sink }
    }
}

impl SubAgentCaller for LocalCaller {
    fn call(&self, request: InvokeRequest, trace: TraceHeaders) -> CallFuture<'_> {
        Box::pin(async move {
            let ctx = extract_traceparent(Some(&trace.traceparent));
            let result = self.agent.invoke(&request, ctx).await;
            if let Some(span) = &result.span {
                self.sink.emit(span.clone());
            }
            Ok(result)
        })
    }
}
