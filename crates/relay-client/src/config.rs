//! Options the host platform stores for the conversation agent

use serde::{Deserialize, Serialize};

use crate::types::JsonObject;

/// Integration domain under which the host registers the agent
pub const DOMAIN: &str = "extended_conversation_client";

pub const CONF_SERVER_URL: &str = "server_url";
pub const CONF_SERVER_ENABLED: &str = "server_enabled";

/// Docker host address as seen from the host platform's container
pub const DEFAULT_SERVER_URL: &str = "http://172.20.0.1:8129";
pub const DEFAULT_SERVER_ENABLED: bool = true;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_server_enabled")]
    pub server_enabled: bool,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_server_enabled() -> bool {
    DEFAULT_SERVER_ENABLED
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            server_enabled: default_server_enabled(),
        }
    }
}

impl ClientConfig {
    /// Read the options mapping of a config entry; missing or mistyped keys fall back to defaults
    pub fn from_options(options: &JsonObject) -> Self {
        let server_url = options
            .get(CONF_SERVER_URL)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(default_server_url);
        let server_enabled = options
            .get(CONF_SERVER_ENABLED)
            .and_then(|v| v.as_bool())
            .unwrap_or(DEFAULT_SERVER_ENABLED);

        Self {
            server_url,
            server_enabled,
        }
    }

    /// The `config` block sent along with every request envelope
    pub fn request_config(&self) -> JsonObject {
        let mut config = JsonObject::new();
        config.insert(CONF_SERVER_URL.into(), self.server_url.clone().into());
        config
    }
}
