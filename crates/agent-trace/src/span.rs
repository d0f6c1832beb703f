//! Span types for the agent services.
//!
//! A `Span` is a timed record of one traced operation. Spans nest: a service
//! closes its top-level span with its children attached and hands the whole
//! tree to a sink in one piece.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::context::TraceContext;

/// Outcome of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatus {
    Ok,
    Error,
}

/// Role of the span in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Handles an inbound request.
    Server,
    /// Wraps an outbound call to another service.
    Client,
    /// Local work such as a tool execution.
    Internal,
}

/// A single traced operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    #[serde(flatten)]
    pub context: TraceContext,
    pub name: String,
    pub kind: SpanKind,
    pub status: SpanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub children: Vec<Span>,
}

impl Span {
    /// Open a span for `context`.
    pub fn start(context: TraceContext, name: impl Into<String>, kind: SpanKind) -> Self {
        Self {
            context,
            name: name.into(),
            kind,
            status: SpanStatus::Ok,
            status_message: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// Close the span with status OK.
    pub fn end_ok(&mut self) {
        self.status = SpanStatus::Ok;
        self.close();
    }

    /// Close the span with status ERROR.
    pub fn end_error(&mut self, message: impl Into<String>) {
        self.status = SpanStatus::Error;
        self.status_message = Some(message.into());
        self.close();
    }

    fn close(&mut self) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Context for work started underneath this span.
    pub fn child_context(&self) -> TraceContext {
        self.context.child()
    }

    pub fn add_child(&mut self, child: Span) {
        self.children.push(child);
    }

    /// This span and all descendants, parents before children.
    pub fn flatten(&self) -> Vec<&Span> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.flatten());
        }
        out
    }

    /// Direct children whose name starts with `prefix`.
    pub fn children_named(&self, prefix: &str) -> Vec<&Span> {
        self.children
            .iter()
            .filter(|c| c.name.starts_with(prefix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_span_is_open() {
        let span = Span::start(TraceContext::root(), "invoke_agent weather", SpanKind::Server);

        assert_eq!(span.status, SpanStatus::Ok);
        assert!(!span.is_ended());
        assert!(span.duration_ms.is_none());
    }

    #[test]
    fn test_end_ok() {
        let mut span = Span::start(TraceContext::root(), "op", SpanKind::Internal);
        span.end_ok();

        assert_eq!(span.status, SpanStatus::Ok);
        assert!(span.is_ended());
        assert!(span.status_message.is_none());
    }

    #[test]
    fn test_end_error() {
        let mut span = Span::start(TraceContext::root(), "op", SpanKind::Internal);
        span.end_error("tool_error");

        assert_eq!(span.status, SpanStatus::Error);
        assert_eq!(span.status_message.as_deref(), Some("tool_error"));
        assert!(span.duration_ms.is_some());
    }

    #[test]
    fn test_attributes() {
        let span = Span::start(TraceContext::root(), "op", SpanKind::Internal)
            .with_attribute("destination", "Paris")
            .with_attribute("errors_count", 2);

        assert_eq!(span.attribute("destination"), Some(&serde_json::json!("Paris")));
        assert_eq!(span.attribute("errors_count"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_flatten_orders_parents_first() {
        let mut root = Span::start(TraceContext::root(), "root", SpanKind::Server);
        let mut client = Span::start(root.child_context(), "call_agent weather", SpanKind::Client);
        let remote = Span::start(client.child_context(), "invoke_agent weather", SpanKind::Server);
        client.add_child(remote);
        root.add_child(client);

        let names: Vec<&str> = root.flatten().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["root", "call_agent weather", "invoke_agent weather"]);
        assert_eq!(root.children_named("call_agent").len(), 1);
    }

    #[test]
    fn test_json_serialization_roundtrip() {
        let mut span = Span::start(TraceContext::root(), "root", SpanKind::Server);
        let mut child = Span::start(span.child_context(), "execute_tool get_forecast", SpanKind::Internal);
        child.end_ok();
        span.add_child(child);
        span.end_error("partial");

        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["status"], "ERROR");
        assert!(json["trace_id"].is_string());

        let back: Span = serde_json::from_value(json).unwrap();
        assert_eq!(back.context, span.context);
        assert_eq!(back.children.len(), 1);
        assert_eq!(back.children[0].status, SpanStatus::Ok);
    }
}
