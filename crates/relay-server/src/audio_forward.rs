//! Best-effort hand-off of uploaded audio to the audio-processing service

use std::time::Duration;

use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::audio_store::AudioContext;

#[derive(Debug, thiserror::Error)]
pub enum AudioForwardError {
    #[error("Audio service not reachable at {url}: {reason}")]
    NotReachable { url: String, reason: String },
    #[error("Audio service rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Failed to build upload form: {0}")]
    Form(String),
}

/// Outcome reported back to the uploader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardStatus {
    Forwarded,
    Rejected,
    Unreachable,
}

impl From<&AudioForwardError> for ForwardStatus {
    fn from(err: &AudioForwardError) -> Self {
        match err {
            AudioForwardError::Rejected { .. } => ForwardStatus::Rejected,
            AudioForwardError::NotReachable { .. } | AudioForwardError::Form(_) => {
                ForwardStatus::Unreachable
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioForwarder {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl AudioForwarder {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout,
        }
    }

    /// POST the audio as multipart (`file`, `conversation_id`) to `/process_audio`
    pub async fn forward(&self, context: &AudioContext) -> Result<(), AudioForwardError> {
        let url = format!("{}/process_audio", self.base_url);

        let mut file =
            Part::stream_with_length(context.audio.clone(), context.size_bytes() as u64)
                .file_name(context.filename.clone().unwrap_or_else(|| "audio.wav".to_string()));
        if let Some(content_type) = &context.content_type {
            file = file
                .mime_str(content_type)
                .map_err(|e| AudioForwardError::Form(e.to_string()))?;
        }
        let form = Form::new()
            .part("file", file)
            .text("conversation_id", context.conversation_id.clone());

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Failed to forward audio to {}: {}", url, e);
                AudioForwardError::NotReachable {
                    url: self.base_url.clone(),
                    reason: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Audio service returned {} for {}", status, context.conversation_id);
            return Err(AudioForwardError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            "Forwarded {} bytes of audio for conversation {}",
            context.size_bytes(),
            context.conversation_id
        );
        Ok(())
    }
}
