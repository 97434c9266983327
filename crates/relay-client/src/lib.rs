//! Relay Client - forwards host conversation turns to a relay server
//!
//! Used by the host-platform conversation agent to:
//! - Send a turn plus an entity-state snapshot to `/process`
//! - Probe `/health` before the agent is registered
//! - Fall back to local phrase matching when the server cannot help
//!
//! ```text
//! Host platform  -->  ExternalServerAgent  -->  RelayClient  -->  relay server (:8129)
//!                           |
//!                           +--> local fallback ("turn on helix")
//! ```

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::debug;

pub mod agent;
pub mod config;
pub mod intent;
pub mod types;

pub use agent::{
    AgentError, ConversationResult, ExternalServerAgent, HostError, HostPlatform, ReplyErrorCode,
    SpokenReply,
};
pub use config::ClientConfig;
pub use types::*;

/// Upper bound for a `/process` round-trip
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for a `/health` probe
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Error types for relay client operations
#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    #[error("Relay server not reachable at {url}: {reason}")]
    NotReachable { url: String, reason: String },
    #[error("Relay server at {0} timed out")]
    Timeout(String),
    #[error("Relay server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Relay server returned an empty body")]
    EmptyBody,
    #[error("Failed to parse relay server response: {0}")]
    Parse(String),
    #[error("Relay server returned an unusable reply: {0}")]
    Invalid(#[from] EnvelopeError),
}

impl RelayClientError {
    /// Connection-level failure, as opposed to a reply we could not use
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RelayClientError::NotReachable { .. } | RelayClientError::Timeout(_)
        )
    }
}

/// Client for a relay server's `/process` and `/health` endpoints
#[derive(Debug, Clone)]
pub struct RelayClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl RelayClient {
    /// Create a new relay client with the given base URL
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout: DEFAULT_PROCESS_TIMEOUT,
        }
    }

    /// Override the `/process` timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Health check
    pub async fn health_check(&self) -> Result<HealthResponse, RelayClientError> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| RelayClientError::Parse(e.to_string()))
    }

    /// Reduce a health probe to a liveness value; only HTTP 200 counts as healthy
    pub async fn probe_health(&self) -> HealthStatus {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => HealthStatus::Healthy,
            Ok(resp) => {
                debug!("Health probe at {} returned {}", url, resp.status());
                HealthStatus::Unhealthy
            }
            Err(e) => {
                debug!("Health probe at {} failed: {}", url, e);
                HealthStatus::Unavailable
            }
        }
    }

    /// Send one conversation turn for processing; only HTTP 200 with a usable envelope succeeds
    pub async fn process(
        &self,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, RelayClientError> {
        let url = format!("{}/process", self.base_url);
        debug!("POST {} for conversation {:?}", url, request.user_input.conversation_id);

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Option<ResponseEnvelope> = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                RelayClientError::Timeout(self.base_url.clone())
            } else {
                RelayClientError::Parse(e.to_string())
            }
        })?;

        let body = body.ok_or(RelayClientError::EmptyBody)?;
        body.validate()?;
        Ok(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> RelayClientError {
        if err.is_timeout() {
            RelayClientError::Timeout(self.base_url.clone())
        } else {
            RelayClientError::NotReachable {
                url: self.base_url.clone(),
                reason: err.to_string(),
            }
        }
    }
}

/// Stand-in HTTP peers for tests in this and dependent crates
#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use axum::Router;

    /// Serve `router` on an ephemeral local port and return its base URL
    pub async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// A base URL nothing is listening on
    pub fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{port}")
    }
}
