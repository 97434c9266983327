//! Relay server - answers `/process` for the conversation relay
//!
//! One binary covers both deployable roles: with `AUTO_FUNCTION_URL` set it
//! relays to that upstream first; without it, it is the upstream.

pub mod audio_forward;
pub mod audio_store;
pub mod config;
pub mod error;
pub mod processing;
pub mod response;
pub mod routes;
pub mod state;

pub use state::AppState;
