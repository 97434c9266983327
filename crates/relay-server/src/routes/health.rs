use axum::{Json, extract::State};
use relay_client::{HealthResponse, HealthStatus};

use crate::state::AppState;

/// Liveness of this service, plus the auto-function upstream when one is configured
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let auto_function = match &state.upstream {
        Some(upstream) => Some(upstream.probe_health().await),
        None => None,
    };

    Json(HealthResponse {
        status: HealthStatus::Healthy,
        auto_function,
    })
}
