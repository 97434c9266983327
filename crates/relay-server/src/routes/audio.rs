//! Audio upload keyed by conversation id
//!
//! The upload is stored locally first; forwarding to the audio-processing
//! service is best effort and only reflected in `forward_status`.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::post,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    audio_forward::ForwardStatus, audio_store::AudioContext, error::ApiError, state::AppState,
};

const MAX_AUDIO_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload_audio", post(upload_audio))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub conversation_id: String,
    pub filename: Option<String>,
    pub size_bytes: usize,
    pub received_at: DateTime<Utc>,
    pub forward_status: ForwardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_error: Option<String>,
}

async fn upload_audio(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let conversation_id = query.conversation_id.trim().to_string();
    if conversation_id.is_empty() {
        return Err(ApiError::BadRequest(
            "conversation_id must not be empty".to_string(),
        ));
    }

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let audio = field.bytes().await?;
        upload = Some(AudioContext::new(
            conversation_id.clone(),
            filename,
            content_type,
            audio,
        ));
    }
    let context = upload
        .ok_or_else(|| ApiError::BadRequest("multipart field 'file' is required".to_string()))?;

    state.audio_store.insert(context.clone()).await;

    let (forward_status, forward_error) = match state.audio_forwarder.forward(&context).await {
        Ok(()) => (ForwardStatus::Forwarded, None),
        Err(e) => (ForwardStatus::from(&e), Some(e.to_string())),
    };
    info!(
        "Audio upload for {} received at {} finished, forward status {:?}",
        conversation_id, context.received_at, forward_status
    );

    Ok(Json(UploadResponse {
        status: "uploaded",
        conversation_id,
        filename: context.filename.clone(),
        size_bytes: context.size_bytes(),
        received_at: context.received_at,
        forward_status,
        forward_error,
    }))
}
