//! Axum extractor for trace context from HTTP headers.
//!
//! Reads `traceparent` from request headers. Unlike most extractors this one
//! never rejects: a missing or malformed header starts a fresh trace.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use crate::context::TraceContext;
use crate::propagation::extract;

/// Server-side trace context for the current request.
pub struct TraceParent(pub TraceContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for TraceParent {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(extract(&parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract_from(request: Request<()>) -> TraceContext {
        let (mut parts, _) = request.into_parts();
        let TraceParent(ctx) = TraceParent::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_extractor_continues_valid_header() {
        let request = Request::builder()
            .header(
                "traceparent",
                "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01",
            )
            .body(())
            .unwrap();

        let ctx = extract_from(request).await;
        assert_eq!(ctx.trace_id.to_hex(), "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(ctx.parent_span_id.unwrap().to_hex(), "00f067aa0ba902b7");
    }

    #[tokio::test]
    async fn test_extractor_accepts_malformed_header() {
        let request = Request::builder()
            .header("traceparent", "not-a-trace")
            .body(())
            .unwrap();

        let ctx = extract_from(request).await;
        assert!(ctx.is_root());
    }
}
