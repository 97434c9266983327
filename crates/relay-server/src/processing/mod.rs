//! Request processing: optional upstream hop, then local phrase handling
//!
//! ```text
//! /process --> auto-function upstream (200 + body) --> returned as-is
//!                  | unreachable / bad status
//!                  v
//!              local handling --> executor plan --> ResponseEnvelope
//! ```
//!
//! Faults never leave this module as HTTP errors; they come back as a
//! `ResponseEnvelope` carrying an `ErrorInfo`.

pub mod executors;

use std::sync::Arc;

use relay_client::{
    EnvelopeError, ErrorInfo, ErrorKind, RelayClient, RelayClientError, RequestEnvelope,
    ResponseEnvelope, intent::LocalIntent,
};
use tracing::{error, info, warn};

use self::executors::IntentPlans;

/// Phrase that deliberately fails local processing
pub const SIMULATED_ERROR_TRIGGER: &str = "cause error";

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error(transparent)]
    InvalidRequest(#[from] EnvelopeError),
    #[error("This is a test error from {0}")]
    Simulated(String),
    #[error("Unusable reply from auto-function service")]
    Upstream(#[source] RelayClientError),
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ProcessError::Simulated(_) => ErrorKind::Simulated,
            ProcessError::Upstream(_) => ErrorKind::Upstream,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Processor {
    service_name: String,
    upstream: Option<RelayClient>,
    plans: Arc<IntentPlans>,
}

impl Processor {
    pub fn new(
        service_name: impl Into<String>,
        upstream: Option<RelayClient>,
        plans: IntentPlans,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            upstream,
            plans: Arc::new(plans),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Process a conversation request; errors are reported in-band
    pub async fn process(&self, request: RequestEnvelope) -> ResponseEnvelope {
        match self.try_process(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error processing request: {}", e);
                let info = ErrorInfo::capture(&e, e.kind(), Some(&self.service_name));
                ResponseEnvelope::failure(
                    format!("An error occurred in {}", self.service_name),
                    request.user_input.conversation_id,
                    info,
                )
            }
        }
    }

    async fn try_process(
        &self,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, ProcessError> {
        request.validate()?;

        if let Some(upstream) = &self.upstream {
            match upstream.process(request).await {
                Ok(response) => {
                    if let Some(err) = &response.error {
                        warn!("Auto-function service reported an error: {}", err);
                    } else {
                        info!("Auto-function service handled request");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_transport() || matches!(e, RelayClientError::Status { .. }) => {
                    warn!("Could not use auto-function service, processing locally: {}", e);
                }
                Err(e) => return Err(ProcessError::Upstream(e)),
            }
        }

        self.process_locally(request).await
    }

    /// Phrase matching plus the selected executor plan
    pub async fn process_locally(
        &self,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, ProcessError> {
        request.validate()?;

        let text = request.user_input.text.to_lowercase();
        if text.contains(SIMULATED_ERROR_TRIGGER) {
            return Err(ProcessError::Simulated(self.service_name.clone()));
        }

        let intent = LocalIntent::classify(&text);
        let output = self.plans.plan_for(intent).run(request).await;
        info!("Handled {:?} locally with {} command(s)", intent, output.commands.len());

        Ok(ResponseEnvelope::reply(
            output.response.unwrap_or_else(|| "OK".to_string()),
            request.user_input.conversation_id.clone(),
        )
        .with_commands(output.commands))
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use axum::{Json, Router, http::StatusCode, routing::post};
    use relay_client::{
        ConversationTurn, JsonObject,
        intent::helix_command,
        test_support::{closed_port_url, spawn_stub},
    };

    use super::*;

    fn request(text: &str) -> RequestEnvelope {
        RequestEnvelope {
            user_input: ConversationTurn::new(text, "en").with_conversation_id("conv-42"),
            states: HashMap::new(),
            config: JsonObject::new(),
        }
    }

    fn local_processor() -> Processor {
        Processor::new("main_server", None, IntentPlans::standard().unwrap())
    }

    fn relaying_processor(upstream_url: &str) -> Processor {
        Processor::new(
            "main_server",
            Some(RelayClient::new(upstream_url).with_timeout(Duration::from_secs(2))),
            IntentPlans::standard().unwrap(),
        )
    }

    #[tokio::test]
    async fn test_local_helix_in_both_languages() {
        let processor = local_processor();
        for text in ["Turn on Helix please", "Bitte SCHALTE HELIX EIN"] {
            let response = processor.process(request(text)).await;
            assert!(response.error.is_none());
            assert_eq!(response.response, "Helix Licht eingeschaltet");
            assert_eq!(response.commands(), &[helix_command()]);
            assert_eq!(response.conversation_id.as_deref(), Some("conv-42"));
        }
    }

    #[tokio::test]
    async fn test_local_greeting_has_no_commands() {
        let response = local_processor().process(request("good morning")).await;
        assert_eq!(response.response, "Hallo Welt remote");
        assert!(response.commands.is_none());
    }

    #[tokio::test]
    async fn test_cause_error_is_reported_in_band() {
        let response = local_processor().process(request("please Cause Error now")).await;
        assert_eq!(response.response, "An error occurred in main_server");
        assert_eq!(response.conversation_id.as_deref(), Some("conv-42"));

        let error = response.error.unwrap();
        assert!(error.message.contains("test error"));
        assert_eq!(error.kind, ErrorKind::Simulated);
        assert_eq!(error.service_name.as_deref(), Some("main_server"));
    }

    #[tokio::test]
    async fn test_empty_text_is_invalid() {
        let response = local_processor().process(request("  ")).await;
        assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_upstream_reply_is_passed_through_verbatim() {
        let upstream = ResponseEnvelope::failure(
            "An error occurred in auto function server",
            Some("upstream-conv".into()),
            ErrorInfo::new("This is a test error from auto function server", ErrorKind::Simulated)
                .with_service("auto_function_server"),
        );
        let reply = upstream.clone();
        let router = Router::new().route("/process", post(move || async move { Json(reply) }));
        let processor = relaying_processor(&spawn_stub(router).await);

        let response = processor.process(request("turn on helix")).await;
        assert_eq!(response, upstream);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_falls_back_quickly() {
        let processor = relaying_processor(&closed_port_url());

        let started = std::time::Instant::now();
        let response = processor.process(request("Turn on Helix please")).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(response.error.is_none());
        assert_eq!(response.commands(), &[helix_command()]);
    }

    #[tokio::test]
    async fn test_upstream_error_status_falls_back() {
        let router = Router::new().route(
            "/process",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let processor = relaying_processor(&spawn_stub(router).await);

        let response = processor.process(request("hi")).await;
        assert_eq!(response.response, "Hallo Welt remote");
    }

    #[tokio::test]
    async fn test_upstream_no_content_falls_back() {
        let router = Router::new().route("/process", post(|| async { StatusCode::NO_CONTENT }));
        let processor = relaying_processor(&spawn_stub(router).await);

        let response = processor.process(request("turn on helix")).await;
        assert!(response.error.is_none());
        assert_eq!(response.response, "Helix Licht eingeschaltet");
        assert_eq!(response.commands(), &[helix_command()]);
    }

    #[tokio::test]
    async fn test_blank_upstream_reply_is_an_upstream_error() {
        let router = Router::new().route(
            "/process",
            post(|| async { Json(serde_json::json!({"response": "", "conversation_id": null})) }),
        );
        let processor = relaying_processor(&spawn_stub(router).await);

        let response = processor.process(request("turn on helix")).await;
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Upstream);
        assert!(error.detail.contains("neither response text nor an error"));
    }

    #[tokio::test]
    async fn test_unparseable_upstream_reply_is_an_upstream_error() {
        let router = Router::new().route(
            "/process",
            post(|| async { Json(serde_json::json!({"reply": "wrong shape"})) }),
        );
        let processor = relaying_processor(&spawn_stub(router).await);

        let response = processor.process(request("hi")).await;
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Upstream);
        assert!(error.detail.contains("Failed to parse relay server response"));
    }
}
