//! Assembly and verification of a request's span tree.
//!
//! Each service emits its own span tree; a consumer holding every tree for
//! one request (a sink, a test) can merge them here and check that they form
//! one well-linked trace.

use std::collections::HashMap;
use thiserror::Error;

use crate::context::{SpanId, TraceId};
use crate::span::Span;

/// A broken link in a request's span tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeViolation {
    #[error("tree contains no spans")]
    Empty,

    #[error("spans belong to {0} different traces")]
    MixedTraces(usize),

    #[error("expected exactly one root span, found {0}")]
    RootCount(usize),

    #[error("span id {0} appears more than once")]
    DuplicateSpan(SpanId),

    #[error("span {span} points at unknown parent {parent}")]
    DanglingParent { span: SpanId, parent: SpanId },
}

/// Flat view over every span emitted for one request.
#[derive(Debug, Clone, Default)]
pub struct TraceTree {
    spans: Vec<Span>,
}

impl TraceTree {
    /// Collect the given span trees, flattening nested children.
    pub fn from_spans<I>(trees: I) -> Self
    where
        I: IntoIterator<Item = Span>,
    {
        let mut spans = Vec::new();
        for tree in trees {
            flatten_into(tree, &mut spans);
        }
        Self { spans }
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Spans whose name starts with `prefix`.
    pub fn named(&self, prefix: &str) -> Vec<&Span> {
        self.spans
            .iter()
            .filter(|s| s.name.starts_with(prefix))
            .collect()
    }

    /// Direct children of `parent` across all merged trees.
    pub fn children_of(&self, parent: SpanId) -> Vec<&Span> {
        self.spans
            .iter()
            .filter(|s| s.context.parent_span_id == Some(parent))
            .collect()
    }

    /// Check that the spans form one trace with a single root and that
    /// every non-root span's parent is exactly one other span in the tree.
    pub fn verify(&self) -> Result<TraceId, TreeViolation> {
        let first = self.spans.first().ok_or(TreeViolation::Empty)?;

        let mut traces: Vec<TraceId> = self.spans.iter().map(|s| s.context.trace_id).collect();
        traces.sort();
        traces.dedup();
        if traces.len() != 1 {
            return Err(TreeViolation::MixedTraces(traces.len()));
        }

        let mut ids: HashMap<SpanId, usize> = HashMap::new();
        for span in &self.spans {
            *ids.entry(span.context.span_id).or_default() += 1;
        }
        if let Some((id, _)) = ids.iter().find(|(_, count)| **count > 1) {
            return Err(TreeViolation::DuplicateSpan(*id));
        }

        let roots = self.spans.iter().filter(|s| s.context.is_root()).count();
        if roots != 1 {
            return Err(TreeViolation::RootCount(roots));
        }

        for span in &self.spans {
            if let Some(parent) = span.context.parent_span_id {
                if !ids.contains_key(&parent) {
                    return Err(TreeViolation::DanglingParent {
                        span: span.context.span_id,
                        parent,
                    });
                }
            }
        }

        Ok(first.context.trace_id)
    }
}

fn flatten_into(mut span: Span, out: &mut Vec<Span>) {
    let children = std::mem::take(&mut span.children);
    out.push(span);
    for child in children {
        flatten_into(child, out);
    }
}
