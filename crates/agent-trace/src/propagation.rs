//! W3C `traceparent` injection and extraction.
//!
//! `inject` always succeeds. `extract` never fails: a missing or malformed
//! header yields a fresh, unlinked trace so a bad header can only cost
//! telemetry fidelity, never the request itself.

use axum::http::HeaderMap;
use thiserror::Error;

use crate::context::{SpanId, TraceContext, TraceId};

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

/// Vendor key used in `tracestate` for the caller's own parent span.
const TRACESTATE_KEY: &str = "fanout";

const SUPPORTED_VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

/// Reasons a `traceparent` value is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraceParseError {
    #[error("traceparent header is missing")]
    Missing,

    #[error("expected 4 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid version: {0}")]
    Version(String),

    #[error("{field} has length {len}, expected {expected}")]
    Length {
        field: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("{0} is not lowercase hex")]
    NotHex(&'static str),

    #[error("{0} is all zeros")]
    ZeroId(&'static str),
}

/// Header representation of a trace context for an outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHeaders {
    pub traceparent: String,
    pub tracestate: Option<String>,
}

impl TraceHeaders {
    /// Header name/value pairs, ready for any HTTP client.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(TRACEPARENT_HEADER, self.traceparent.clone())];
        if let Some(state) = &self.tracestate {
            pairs.push((TRACESTATE_HEADER, state.clone()));
        }
        pairs
    }
}

/// Serialize a context for an outbound call.
///
/// `traceparent` carries the trace id, this hop's span id and the sampled
/// flag; `tracestate` carries this hop's own parent id when it has one.
pub fn inject(ctx: &TraceContext) -> TraceHeaders {
    let flags = if ctx.sampled { FLAG_SAMPLED } else { 0 };
    TraceHeaders {
        traceparent: format!(
            "{}-{}-{}-{:02x}",
            SUPPORTED_VERSION, ctx.trace_id, ctx.span_id, flags
        ),
        tracestate: ctx
            .parent_span_id
            .map(|parent| format!("{}={}", TRACESTATE_KEY, parent)),
    }
}

/// Parse a `traceparent` value into the remote caller's context.
pub fn parse_traceparent(value: &str) -> Result<TraceContext, TraceParseError> {
    let value = value.trim();
    let fields: Vec<&str> = value.split('-').collect();
    if fields.len() < 4 {
        return Err(TraceParseError::FieldCount(fields.len()));
    }

    let version = fields[0];
    check_field("version", version, 2)?;
    if version == "ff" {
        return Err(TraceParseError::Version(version.to_string()));
    }
    // Version 00 has exactly four fields; later versions may append more.
    if version == SUPPORTED_VERSION && fields.len() != 4 {
        return Err(TraceParseError::FieldCount(fields.len()));
    }

    check_field("trace-id", fields[1], 32)?;
    check_field("parent-id", fields[2], 16)?;
    check_field("trace-flags", fields[3], 2)?;

    let trace_id = TraceId::from_hex(fields[1]).ok_or(TraceParseError::ZeroId("trace-id"))?;
    let span_id = SpanId::from_hex(fields[2]).ok_or(TraceParseError::ZeroId("parent-id"))?;
    let flags =
        u8::from_str_radix(fields[3], 16).map_err(|_| TraceParseError::NotHex("trace-flags"))?;

    Ok(TraceContext {
        trace_id,
        span_id,
        parent_span_id: None,
        sampled: flags & FLAG_SAMPLED == FLAG_SAMPLED,
    })
}

fn check_field(field: &'static str, value: &str, expected: usize) -> Result<(), TraceParseError> {
    if value.len() != expected {
        return Err(TraceParseError::Length {
            field,
            len: value.len(),
            expected,
        });
    }
    if !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(TraceParseError::NotHex(field));
    }
    Ok(())
}

/// Server-side context for an inbound call carrying `traceparent`.
///
/// A valid header yields a child of the remote span; anything else starts a
/// fresh root trace.
pub fn extract_traceparent(value: Option<&str>) -> TraceContext {
    let remote = value
        .ok_or(TraceParseError::Missing)
        .and_then(parse_traceparent);

    match remote {
        Ok(parent) => parent.child(),
        Err(TraceParseError::Missing) => TraceContext::root(),
        Err(e) => {
            tracing::debug!(error = %e, "Discarding malformed traceparent, starting new trace");
            TraceContext::root()
        }
    }
}

/// Server-side context for an inbound request's headers.
pub fn extract(headers: &HeaderMap) -> TraceContext {
    extract_traceparent(
        headers
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok()),
    )
}
