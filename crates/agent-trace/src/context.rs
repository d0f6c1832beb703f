//! Trace context passed between services.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 128-bit trace identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TraceId(u128);

/// 64-bit span identifier, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SpanId(u64);

impl TraceId {
    /// Generate a random, non-zero trace id.
    pub fn random() -> Self {
        // v4 version bits are always set, so the value is never zero.
        Self(Uuid::new_v4().as_u128())
    }

    /// Wrap a raw value. Returns `None` for the invalid all-zero id.
    pub fn from_u128(value: u128) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    /// Parse 32 hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Self::from_u128(u128::from_be_bytes(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl SpanId {
    /// Generate a random, non-zero span id.
    pub fn random() -> Self {
        // The low half of a v4 uuid carries the variant bits, never zero.
        let (_, low) = Uuid::new_v4().as_u64_pair();
        Self(low)
    }

    /// Wrap a raw value. Returns `None` for the invalid all-zero id.
    pub fn from_u64(value: u64) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Parse 16 hex characters.
    pub fn from_hex(s: &str) -> Option<Self> {
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Self::from_u64(u64::from_be_bytes(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.to_hex()
    }
}

impl From<SpanId> for String {
    fn from(id: SpanId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for TraceId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 32 {
            return Err(format!("trace id must be 32 hex characters, got {}", value.len()));
        }
        Self::from_hex(&value).ok_or_else(|| format!("invalid trace id: {}", value))
    }
}

impl TryFrom<String> for SpanId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 16 {
            return Err(format!("span id must be 16 hex characters, got {}", value.len()));
        }
        Self::from_hex(&value).ok_or_else(|| format!("invalid span id: {}", value))
    }
}

/// Identifier set linking one operation into its request tree.
///
/// Every span produced while serving one logical request shares the same
/// `trace_id`; a child's `parent_span_id` is its caller's `span_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,
    pub sampled: bool,
}

impl TraceContext {
    /// Start a fresh trace with no parent.
    pub fn root() -> Self {
        Self {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            parent_span_id: None,
            sampled: true,
        }
    }

    /// Derive a child span under this context's trace.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::random(),
            parent_span_id: Some(self.span_id),
            sampled: self.sampled,
        }
    }

    /// Continue `existing` with a child span, or start a new trace.
    pub fn begin(existing: Option<&TraceContext>) -> Self {
        match existing {
            Some(parent) => parent.child(),
            None => Self::root(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}
