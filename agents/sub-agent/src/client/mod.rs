//! Client for invoking a sub-agent remotely
//!
//! Used by the orchestrator for each fan-out call.

use agent_trace::TraceHeaders;
use std::time::Duration;

use crate::contracts::*;

/// Sub-agent client
#[derive(Clone)]
pub struct SubAgentClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl SubAgentClient {
    /// Create new client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client sharing an existing connection pool
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Invoke the agent, propagating `trace`.
    ///
    /// Fault responses (429, 502, 504) still carry a `SubAgentResult` and are
    /// returned as `Ok`; only unparseable or validation replies are errors.
    pub async fn invoke(
        &self,
        request: &InvokeRequest,
        trace: &TraceHeaders,
    ) -> Result<SubAgentResult, ClientError> {
        let url = format!("{}/invoke", self.base_url);

        let mut builder = self.client.post(&url).json(request).timeout(self.timeout);
        for (name, value) in trace.pairs() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout)
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        match serde_json::from_slice::<SubAgentResult>(&body) {
            Ok(result) => Ok(result),
            Err(e) if status.is_success() => Err(ClientError::Parse(e.to_string())),
            Err(_) => Err(ClientError::Server {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            }),
        }
    }

    /// Check the agent is up
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|e| ClientError::Parse(e.to_string()))
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Err(ClientError::Server {
                status: status.as_u16(),
                message: error_text,
            })
        }
    }
}

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },
}
