//! Uploaded audio kept per conversation
//!
//! Entries expire after a fixed time-to-live and the store never holds more
//! than its configured number of conversations. Uploading twice for the same
//! conversation id replaces the earlier audio.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use tracing::info;

/// Audio received for one conversation
#[derive(Debug, Clone)]
pub struct AudioContext {
    pub conversation_id: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub audio: Bytes,
    pub received_at: DateTime<Utc>,
}

impl AudioContext {
    pub fn new(
        conversation_id: impl Into<String>,
        filename: Option<String>,
        content_type: Option<String>,
        audio: Bytes,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            filename,
            content_type,
            audio,
            received_at: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.audio.len()
    }
}

#[derive(Debug, Clone)]
pub struct AudioContextStore {
    cache: Cache<String, Arc<AudioContext>>,
}

impl AudioContextStore {
    /// # Arguments
    /// * `max_entries` - Maximum number of conversations kept
    /// * `ttl` - How long an upload is kept after it was stored
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Store audio for its conversation, returning whether an earlier upload was replaced
    pub async fn insert(&self, context: AudioContext) -> bool {
        let key = context.conversation_id.clone();
        let replaced = self.cache.contains_key(&key);

        info!(
            "Stored audio for conversation {} ({} bytes{})",
            key,
            context.size_bytes(),
            if replaced { ", replacing earlier upload" } else { "" }
        );

        self.cache.insert(key, Arc::new(context)).await;
        replaced
    }

    pub async fn get(&self, conversation_id: &str) -> Option<Arc<AudioContext>> {
        self.cache.get(conversation_id).await
    }

    pub async fn remove(&self, conversation_id: &str) -> Option<Arc<AudioContext>> {
        self.cache.remove(conversation_id).await
    }

    /// Number of live entries after pending evictions have been applied
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
