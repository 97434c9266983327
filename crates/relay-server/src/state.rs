use std::sync::Arc;

use relay_client::RelayClient;

use crate::{
    audio_forward::AudioForwarder,
    audio_store::AudioContextStore,
    config::ServerConfig,
    processing::{
        Processor,
        executors::{ExecutorError, IntentPlans},
    },
};

/// Shared handler state; cloned per request
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub processor: Processor,
    /// Auto-function hop, also probed by `/health`
    pub upstream: Option<RelayClient>,
    pub audio_store: AudioContextStore,
    pub audio_forwarder: AudioForwarder,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, ExecutorError> {
        Ok(Self::with_plans(config, IntentPlans::standard()?))
    }

    pub fn with_plans(config: ServerConfig, plans: IntentPlans) -> Self {
        let upstream = config
            .auto_function_url
            .as_deref()
            .map(|url| RelayClient::new(url).with_timeout(config.upstream_timeout));
        let processor = Processor::new(config.service_name.clone(), upstream.clone(), plans);
        let audio_store =
            AudioContextStore::new(config.audio_context_max_entries, config.audio_context_ttl);
        let audio_forwarder =
            AudioForwarder::new(&config.audio_service_url, config.upstream_timeout);

        Self {
            config: Arc::new(config),
            processor,
            upstream,
            audio_store,
            audio_forwarder,
        }
    }
}
