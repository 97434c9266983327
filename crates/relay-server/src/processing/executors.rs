//! Executors: small units that each contribute response text and/or commands
//!
//! The set is closed. Each variant carries a configuration that was checked
//! when it was built, so running an executor cannot hit an unknown name or an
//! invalid config.

use futures::future::join_all;
use relay_client::{
    Command, JsonObject, RequestEnvelope,
    intent::{HELIX_ENTITY_ID, LocalIntent},
};
use serde_json::json;
use tracing::debug;

const HELIX_REPLY: &str = "Helix Licht eingeschaltet";
const GREETING: &str = "Hallo Welt remote";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Invalid {executor} configuration: {reason}")]
    InvalidConfig {
        executor: &'static str,
        reason: String,
    },
}

/// Fixed reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTextConfig {
    text: String,
}

impl ResponseTextConfig {
    pub fn new(text: impl Into<String>) -> Result<Self, ExecutorError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ExecutorError::InvalidConfig {
                executor: "response_text",
                reason: "text must not be empty".to_string(),
            });
        }
        Ok(Self { text })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightService {
    TurnOn,
    TurnOff,
    Toggle,
}

impl LightService {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightService::TurnOn => "turn_on",
            LightService::TurnOff => "turn_off",
            LightService::Toggle => "toggle",
        }
    }
}

/// One service call against a light entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightControlConfig {
    entity_id: String,
    service: LightService,
}

impl LightControlConfig {
    pub fn new(entity_id: impl Into<String>, service: LightService) -> Result<Self, ExecutorError> {
        let entity_id = entity_id.into();
        let valid = entity_id
            .strip_prefix("light.")
            .is_some_and(|object_id| !object_id.is_empty());
        if !valid {
            return Err(ExecutorError::InvalidConfig {
                executor: "light_control",
                reason: format!("'{}' is not a light entity id", entity_id),
            });
        }
        Ok(Self { entity_id, service })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn command(&self) -> Command {
        let mut data = JsonObject::new();
        data.insert("entity_id".into(), json!(self.entity_id));
        Command::new("light", self.service.as_str(), data)
    }
}

/// Output of a single executor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorOutput {
    pub response: Option<String>,
    pub commands: Vec<Command>,
}

impl ExecutorOutput {
    /// Concatenate commands in order; the last non-empty response text wins
    pub fn merge(outputs: impl IntoIterator<Item = ExecutorOutput>) -> Self {
        outputs
            .into_iter()
            .fold(ExecutorOutput::default(), |mut merged, output| {
                merged.commands.extend(output.commands);
                if let Some(text) = output.response.filter(|text| !text.is_empty()) {
                    merged.response = Some(text);
                }
                merged
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executor {
    ResponseText(ResponseTextConfig),
    LightControl(LightControlConfig),
}

impl Executor {
    pub fn name(&self) -> &'static str {
        match self {
            Executor::ResponseText(_) => "response_text",
            Executor::LightControl(_) => "light_control",
        }
    }

    pub async fn execute(&self, request: &RequestEnvelope) -> ExecutorOutput {
        match self {
            Executor::ResponseText(config) => ExecutorOutput {
                response: Some(config.text().to_string()),
                commands: Vec::new(),
            },
            Executor::LightControl(config) => {
                if let Some(state) = request.states.get(config.entity_id()) {
                    debug!("{} is currently {}", config.entity_id(), state);
                }
                ExecutorOutput {
                    response: None,
                    commands: vec![config.command()],
                }
            }
        }
    }
}

/// Executors selected for one request; they run concurrently and are all joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorPlan {
    executors: Vec<Executor>,
}

impl ExecutorPlan {
    pub fn new(executors: Vec<Executor>) -> Self {
        Self { executors }
    }

    pub fn executors(&self) -> &[Executor] {
        &self.executors
    }

    pub async fn run(&self, request: &RequestEnvelope) -> ExecutorOutput {
        debug!(
            "Running executors: {}",
            self.executors
                .iter()
                .map(Executor::name)
                .collect::<Vec<_>>()
                .join(", ")
        );
        let outputs = join_all(self.executors.iter().map(|executor| executor.execute(request))).await;
        ExecutorOutput::merge(outputs)
    }
}

/// Plan per locally recognised intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentPlans {
    helix: ExecutorPlan,
    greeting: ExecutorPlan,
}

impl IntentPlans {
    pub fn new(helix: ExecutorPlan, greeting: ExecutorPlan) -> Self {
        Self { helix, greeting }
    }

    /// Switch the Helix light on, or greet
    pub fn standard() -> Result<Self, ExecutorError> {
        Ok(Self {
            helix: ExecutorPlan::new(vec![
                Executor::LightControl(LightControlConfig::new(
                    HELIX_ENTITY_ID,
                    LightService::TurnOn,
                )?),
                Executor::ResponseText(ResponseTextConfig::new(HELIX_REPLY)?),
            ]),
            greeting: ExecutorPlan::new(vec![Executor::ResponseText(ResponseTextConfig::new(
                GREETING,
            )?)]),
        })
    }

    pub fn plan_for(&self, intent: LocalIntent) -> &ExecutorPlan {
        match intent {
            LocalIntent::TurnOnHelix => &self.helix,
            LocalIntent::Greeting => &self.greeting,
        }
    }
}
