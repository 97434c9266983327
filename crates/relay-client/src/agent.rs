//! Conversation agent the host platform embeds
//!
//! Each turn is relayed to the configured server; anything short of a clean
//! reply (transport fault, bad status, unparseable body, in-band error) is
//! handled by the local phrase matcher instead. Nothing is retried.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::{
    config::ClientConfig,
    intent::{self, LocalIntent},
    types::{ConversationTurn, JsonObject, RequestEnvelope},
    RelayClient,
};

const LOCAL_HELIX_REPLY: &str = "Turned on Helix light";
const LOCAL_GREETING: &str = "Hello World local";

/// Capabilities the agent needs from the host platform
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// Snapshot of every entity's current state, keyed by entity id
    async fn entity_states(&self) -> HashMap<String, String>;

    /// Dispatch one service call and wait for it to finish
    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: JsonObject,
    ) -> Result<(), HostError>;
}

/// Errors raised by the host platform's service registry
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Service {domain}.{service} not found")]
    ServiceNotFound { domain: String, service: String },
    #[error("Service call failed: {0}")]
    CallFailed(String),
}

/// Agent-level errors
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The host should retry setup later
    #[error("Relay server not ready: {0}")]
    NotReady(String),
    #[error("Local processing failed: {0}")]
    Local(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyErrorCode {
    Unknown,
}

/// What the host speaks back to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpokenReply {
    Speech {
        language: String,
        text: String,
    },
    Error {
        language: String,
        code: ReplyErrorCode,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationResult {
    pub response: SpokenReply,
    pub conversation_id: Option<String>,
}

impl ConversationResult {
    fn speech(language: &str, text: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            response: SpokenReply::Speech {
                language: language.to_string(),
                text: text.into(),
            },
            conversation_id,
        }
    }

    fn error(language: &str, message: impl Into<String>) -> Self {
        Self {
            response: SpokenReply::Error {
                language: language.to_string(),
                code: ReplyErrorCode::Unknown,
                message: message.into(),
            },
            conversation_id: None,
        }
    }

    /// The spoken text, or the error message for error replies
    pub fn text(&self) -> &str {
        match &self.response {
            SpokenReply::Speech { text, .. } => text,
            SpokenReply::Error { message, .. } => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.response, SpokenReply::Error { .. })
    }
}

/// Agent that delegates processing to an external relay server
pub struct ExternalServerAgent<H> {
    host: Arc<H>,
    config: ClientConfig,
    client: RelayClient,
}

impl<H: HostPlatform> ExternalServerAgent<H> {
    pub fn new(host: Arc<H>, config: ClientConfig) -> Self {
        let client = RelayClient::new(&config.server_url);
        Self {
            host,
            config,
            client,
        }
    }

    /// Build the agent once the relay server answers its health probe
    pub async fn setup(host: Arc<H>, config: ClientConfig) -> Result<Self, AgentError> {
        let agent = Self::new(host, config);
        if !agent.config.server_enabled {
            info!("Relay server disabled, skipping connection check");
            return Ok(agent);
        }

        info!("Attempting to connect to server at {}", agent.client.base_url());
        match agent.client.health_check().await {
            Ok(_) => {
                info!("Successfully connected to server");
                Ok(agent)
            }
            Err(e) => {
                error!("Failed to connect to server: {}", e);
                Err(AgentError::NotReady(e.to_string()))
            }
        }
    }

    pub fn supported_languages(&self) -> &'static [&'static str] {
        &["en"]
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Process one turn; failures become an error-coded reply rather than an `Err`
    pub async fn process(&self, turn: ConversationTurn) -> ConversationResult {
        match self.respond(&turn).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error processing request: {}", e);
                ConversationResult::error(&turn.language, format!("Internal error: {e}"))
            }
        }
    }

    async fn respond(&self, turn: &ConversationTurn) -> Result<ConversationResult, AgentError> {
        if !self.config.server_enabled {
            info!("Server is disabled, using local processing");
            return self.process_locally(turn).await;
        }
        self.process_with_server(turn).await
    }

    async fn process_with_server(
        &self,
        turn: &ConversationTurn,
    ) -> Result<ConversationResult, AgentError> {
        let states = self.host.entity_states().await;
        let request =
            match RequestEnvelope::new(turn.clone(), states, self.config.request_config()) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Not relaying turn: {}", e);
                    return self.process_locally(turn).await;
                }
            };

        info!("Attempting server request to: {}", self.client.base_url());
        debug!("Request data: {:?}", request);

        let response = match self.client.process(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to communicate with server: {}", e);
                return self.process_locally(turn).await;
            }
        };
        debug!("Received response from server: {:?}", response);

        if let Some(err) = &response.error {
            error!(detail = %err.detail, "Server error: {}", err);
            return self.process_locally(turn).await;
        }

        for command in response.commands() {
            debug!("Executing command: {}.{}", command.domain, command.service);
            if let Err(e) = self
                .host
                .call_service(&command.domain, &command.service, command.data.clone())
                .await
            {
                error!("Server command {}.{} failed: {}", command.domain, command.service, e);
                return self.process_locally(turn).await;
            }
        }

        Ok(ConversationResult::speech(
            &turn.language,
            response.response,
            response.conversation_id,
        ))
    }

    /// Fallback local processing; faults here propagate to the caller
    pub async fn process_locally(
        &self,
        turn: &ConversationTurn,
    ) -> Result<ConversationResult, AgentError> {
        let text = match LocalIntent::classify(&turn.text) {
            LocalIntent::TurnOnHelix => {
                let command = intent::helix_command();
                self.host
                    .call_service(&command.domain, &command.service, command.data)
                    .await
                    .map_err(|e| {
                        error!("Local processing failed: {}", e);
                        e
                    })?;
                LOCAL_HELIX_REPLY
            }
            LocalIntent::Greeting => LOCAL_GREETING,
        };

        Ok(ConversationResult::speech(&turn.language, text, None))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;

    use super::*;
    use crate::{
        test_support::{closed_port_url, spawn_stub},
        types::{Command, ErrorInfo, ErrorKind, HealthResponse, ResponseEnvelope},
    };

    #[derive(Default)]
    struct MockHost {
        calls: Mutex<Vec<Command>>,
        fail_calls: bool,
    }

    impl MockHost {
        fn failing() -> Self {
            Self {
                fail_calls: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Command> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HostPlatform for MockHost {
        async fn entity_states(&self) -> HashMap<String, String> {
            HashMap::from([
                ("light.helix".to_string(), "off".to_string()),
                ("switch.fan".to_string(), "on".to_string()),
            ])
        }

        async fn call_service(
            &self,
            domain: &str,
            service: &str,
            data: JsonObject,
        ) -> Result<(), HostError> {
            if self.fail_calls {
                return Err(HostError::CallFailed("light.helix is unavailable".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(Command::new(domain, service, data));
            Ok(())
        }
    }

    fn agent(host: Arc<MockHost>, server_url: String) -> ExternalServerAgent<MockHost> {
        ExternalServerAgent::new(
            host,
            ClientConfig {
                server_url,
                server_enabled: true,
            },
        )
    }

    #[tokio::test]
    async fn test_server_down_falls_back_to_local_helix() {
        let host = Arc::new(MockHost::default());
        let agent = agent(host.clone(), closed_port_url());

        let result = agent
            .process(ConversationTurn::new("Turn on Helix please", "en"))
            .await;

        assert_eq!(result.text(), "Turned on Helix light");
        assert_eq!(result.conversation_id, None);
        assert_eq!(host.calls(), vec![intent::helix_command()]);
    }

    #[tokio::test]
    async fn test_disabled_server_goes_straight_to_local() {
        let host = Arc::new(MockHost::default());
        let agent = ExternalServerAgent::new(
            host.clone(),
            ClientConfig {
                server_url: closed_port_url(),
                server_enabled: false,
            },
        );

        let result = agent.process(ConversationTurn::new("what time is it", "en")).await;
        assert_eq!(result.text(), "Hello World local");
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_server_commands_run_in_order() {
        let router = Router::new().route(
            "/process",
            post(|Json(req): Json<RequestEnvelope>| async move {
                let reply = format!(
                    "{} states via {}",
                    req.states.len(),
                    req.config["server_url"].as_str().unwrap_or_default()
                );
                let mut off = JsonObject::new();
                off.insert("entity_id".into(), json!("switch.fan"));
                Json(
                    ResponseEnvelope::reply(reply, Some("server-conv".into())).with_commands(vec![
                        intent::helix_command(),
                        Command::new("switch", "turn_off", off),
                    ]),
                )
            }),
        );
        let url = spawn_stub(router).await;
        let host = Arc::new(MockHost::default());
        let agent = agent(host.clone(), url.clone());

        let result = agent.process(ConversationTurn::new("turn on helix", "en")).await;

        assert_eq!(result.text(), format!("2 states via {url}"));
        assert_eq!(result.conversation_id.as_deref(), Some("server-conv"));
        let calls = host.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], intent::helix_command());
        assert_eq!(calls[1].domain, "switch");
        assert_eq!(calls[1].service, "turn_off");
    }

    #[tokio::test]
    async fn test_in_band_error_is_not_surfaced() {
        let router = Router::new().route(
            "/process",
            post(|| async {
                Json(ResponseEnvelope::failure(
                    "An error occurred in main server",
                    Some("conv".into()),
                    ErrorInfo::new("boom", ErrorKind::Processing).with_service("main_server"),
                ))
            }),
        );
        let host = Arc::new(MockHost::default());
        let agent = agent(host.clone(), spawn_stub(router).await);

        let result = agent.process(ConversationTurn::new("hello there", "en")).await;

        assert!(!result.is_error());
        assert_eq!(result.text(), "Hello World local");
        assert_eq!(result.conversation_id, None);
    }

    #[tokio::test]
    async fn test_blank_server_reply_falls_back() {
        let router = Router::new().route(
            "/process",
            post(|| async {
                Json(json!({"response": "", "commands": null, "conversation_id": null}))
            }),
        );
        let host = Arc::new(MockHost::default());
        let agent = agent(host.clone(), spawn_stub(router).await);

        let result = agent.process(ConversationTurn::new("turn on helix", "en")).await;

        assert!(!result.is_error());
        assert_eq!(result.text(), "Turned on Helix light");
        assert_eq!(host.calls(), vec![intent::helix_command()]);
    }

    #[tokio::test]
    async fn test_bad_status_falls_back() {
        let router = Router::new().route(
            "/process",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let host = Arc::new(MockHost::default());
        let agent = agent(host.clone(), spawn_stub(router).await);

        let result = agent.process(ConversationTurn::new("schalte Helix ein", "en")).await;
        assert_eq!(result.text(), "Turned on Helix light");
        assert_eq!(host.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_local_fault_becomes_error_reply() {
        let host = Arc::new(MockHost::failing());
        let agent = agent(host, closed_port_url());

        let result = agent.process(ConversationTurn::new("turn on helix", "en")).await;

        assert!(result.is_error());
        assert!(result.text().starts_with("Internal error:"));
        assert!(result.text().contains("light.helix is unavailable"));

        let err = agent
            .process_locally(&ConversationTurn::new("turn on helix", "en"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Local(HostError::CallFailed(_))));
    }

    #[tokio::test]
    async fn test_setup_requires_a_healthy_server() {
        let host = Arc::new(MockHost::default());

        let err = ExternalServerAgent::setup(
            host.clone(),
            ClientConfig {
                server_url: closed_port_url(),
                server_enabled: true,
            },
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, AgentError::NotReady(_)));

        let router = Router::new()
            .route("/health", get(|| async { Json(HealthResponse::healthy()) }));
        let agent = ExternalServerAgent::setup(
            host.clone(),
            ClientConfig {
                server_url: spawn_stub(router).await,
                server_enabled: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(agent.supported_languages(), &["en"]);

        let disabled = ExternalServerAgent::setup(
            host,
            ClientConfig {
                server_url: closed_port_url(),
                server_enabled: false,
            },
        )
        .await;
        assert!(disabled.is_ok());
    }
}
