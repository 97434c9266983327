//! Fixed-phrase matching shared by the client fallback and the server's local handling

use serde_json::json;

use crate::types::{Command, JsonObject};

/// Phrases that switch on the Helix light (English and German)
pub const HELIX_TRIGGERS: &[&str] = &["turn on helix", "schalte helix ein"];

pub const HELIX_ENTITY_ID: &str = "light.helix";

/// Case-insensitive substring match against [`HELIX_TRIGGERS`]
pub fn matches_helix(text: &str) -> bool {
    let text = text.to_lowercase();
    HELIX_TRIGGERS.iter().any(|trigger| text.contains(trigger))
}

/// The single canned command this system knows how to issue
pub fn helix_command() -> Command {
    let mut data = JsonObject::new();
    data.insert("entity_id".into(), json!(HELIX_ENTITY_ID));
    Command::new("light", "turn_on", data)
}

/// What local processing decided to do with an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalIntent {
    TurnOnHelix,
    Greeting,
}

impl LocalIntent {
    pub fn classify(text: &str) -> Self {
        if matches_helix(text) {
            LocalIntent::TurnOnHelix
        } else {
            LocalIntent::Greeting
        }
    }
}
