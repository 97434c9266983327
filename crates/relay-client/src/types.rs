//! Wire types shared by the relay client and the relay server

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};

/// Free-form JSON object used for command data and request config
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// One user utterance plus its language/session metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub text: String,
    pub language: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

impl ConversationTurn {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            conversation_id: None,
            device_id: None,
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Envelope construction errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("conversation text must not be empty")]
    EmptyText,
    #[error("reply carries neither response text nor an error")]
    EmptyReply,
}

/// Request sent to `/process`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub user_input: ConversationTurn,
    /// Entity id -> current state snapshot taken from the host
    #[serde(default)]
    pub states: HashMap<String, String>,
    #[serde(default)]
    pub config: JsonObject,
}

impl RequestEnvelope {
    pub fn new(
        user_input: ConversationTurn,
        states: HashMap<String, String>,
        config: JsonObject,
    ) -> Result<Self, EnvelopeError> {
        let envelope = Self {
            user_input,
            states,
            config,
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// Check invariants on an envelope that arrived over the wire
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.user_input.text.trim().is_empty() {
            return Err(EnvelopeError::EmptyText);
        }
        Ok(())
    }
}

/// A single (domain, service, data) instruction for the host platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub domain: String,
    pub service: String,
    #[serde(default)]
    pub data: JsonObject,
}

impl Command {
    pub fn new(domain: impl Into<String>, service: impl Into<String>, data: JsonObject) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data,
        }
    }
}

/// Coarse classification of an in-band error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A further upstream hop answered with something unusable
    Upstream,
    /// The request envelope broke an invariant
    InvalidRequest,
    /// Local processing failed
    Processing,
    /// Deliberately triggered fault used for end-to-end checks
    Simulated,
    #[default]
    Internal,
}

/// Failure context carried back to the caller inside a [`ResponseEnvelope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default)]
    pub kind: ErrorKind,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default, alias = "traceback")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        let message = message.into();
        Self {
            detail: message.clone(),
            message,
            kind,
            service_name: None,
            file_name: None,
            line_number: None,
        }
    }

    /// Build from an error value, walking its `source()` chain for the detail.
    ///
    /// The file/line of the call site is recorded as the best-effort origin.
    #[track_caller]
    pub fn capture<E>(err: &E, kind: ErrorKind, service_name: Option<&str>) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let location = std::panic::Location::caller();

        let mut detail = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str("\ncaused by: ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }

        Self {
            message: err.to_string(),
            kind,
            service_name: service_name.map(str::to_string),
            detail,
            file_name: Some(location.file().to_string()),
            line_number: Some(location.line()),
        }
    }

    pub fn with_service(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service_name {
            Some(service) => write!(f, "[{}] {:?}: {}", service, self.kind, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Reply from `/process`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Text to speak back
    pub response: String,
    #[serde(default, deserialize_with = "non_empty_commands")]
    pub commands: Option<Vec<Command>>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

impl ResponseEnvelope {
    pub fn reply(response: impl Into<String>, conversation_id: Option<String>) -> Self {
        Self {
            response: response.into(),
            commands: None,
            conversation_id,
            error: None,
        }
    }

    pub fn failure(
        response: impl Into<String>,
        conversation_id: Option<String>,
        error: ErrorInfo,
    ) -> Self {
        Self {
            response: response.into(),
            commands: None,
            conversation_id,
            error: Some(error),
        }
    }

    /// Attach commands; an empty list is stored as "no commands"
    pub fn with_commands(mut self, commands: Vec<Command>) -> Self {
        self.commands = if commands.is_empty() {
            None
        } else {
            Some(commands)
        };
        self
    }

    pub fn commands(&self) -> &[Command] {
        self.commands.as_deref().unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// A reply must carry response text, an error, or both
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.response.trim().is_empty() && self.error.is_none() {
            return Err(EnvelopeError::EmptyReply);
        }
        Ok(())
    }
}

fn non_empty_commands<'de, D>(deserializer: D) -> Result<Option<Vec<Command>>, D::Error>
where
    D: Deserializer<'de>,
{
    let commands = Option::<Vec<Command>>::deserialize(deserializer)?;
    Ok(commands.filter(|commands| !commands.is_empty()))
}

/// Liveness value reported by `/health`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unavailable,
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_function: Option<HealthStatus>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            auto_function: None,
        }
    }
}
