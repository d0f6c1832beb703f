//! Distributed trace context and span types for the fan-out agent services.
//!
//! This crate provides the shared pieces every service uses to keep one
//! logical request inside one trace while it crosses process boundaries.
//!
//! # Span Hierarchy
//!
//! ```text
//! travel-planner: invoke_agent travel-planner        (server)
//!   ├─ call_agent weather                            (client)
//!   │    └─ weather-agent: invoke_agent weather      (server, remote)
//!   │         └─ execute_tool get_current_weather    (internal)
//!   └─ call_agent events                             (client)
//!        └─ events-agent: invoke_agent events        (server, remote)
//!             └─ execute_tool fetch_events           (internal)
//! ```
//!
//! # Usage
//!
//! 1. Use [`TraceParent`] in Axum handlers (or [`extract`]) to continue the
//!    caller's trace. Missing or malformed headers start a fresh trace.
//! 2. Open a [`Span`] with the resulting context, derive children with
//!    [`TraceContext::child`].
//! 3. Attach [`inject`]ed headers to every outbound call.
//! 4. Hand the closed span tree to a [`SpanSink`].

pub mod context;
pub mod extract;
pub mod propagation;
pub mod sink;
pub mod span;
pub mod tree;

pub use context::{SpanId, TraceContext, TraceId};
pub use extract::TraceParent;
pub use propagation::{
    extract, extract_traceparent, inject, parse_traceparent, TraceHeaders, TraceParseError,
    TRACEPARENT_HEADER, TRACESTATE_HEADER,
};
pub use sink::{ChannelSink, MemorySink, SinkConfig, SpanSink};
pub use span::{Span, SpanKind, SpanStatus};
pub use tree::{TraceTree, TreeViolation};
