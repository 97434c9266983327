use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod audio;
pub mod health;
pub mod process;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/process", post(process::process_request))
        .merge(audio::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
