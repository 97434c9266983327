use axum::{Json, extract::State};
use relay_client::{RequestEnvelope, ResponseEnvelope};
use tracing::info;

use crate::state::AppState;

/// Always answers 200; failures travel in `ResponseEnvelope::error`
pub async fn process_request(
    State(state): State<AppState>,
    Json(request): Json<RequestEnvelope>,
) -> Json<ResponseEnvelope> {
    info!(
        "Processing request for conversation {:?} ({})",
        request.user_input.conversation_id, request.user_input.language
    );
    Json(state.processor.process(request).await)
}
