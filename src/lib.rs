//! `aircast` — a multi-channel internet radio fan-out server.
//!
//! For each named "channel," an authorized host points it at a playlist; any
//! number of HTTP listeners connect and receive a continuous MP3 byte
//! stream. One [`streamer::Streamer`] per playlist transcodes once and fans
//! the output out to every listener currently attached under any channel
//! pointing at it.

pub mod app_state;
pub mod channel;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod registry;
pub mod silence;
pub mod streamer;
pub mod transcoder;

pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, Result};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::registry::Registry;
use crate::transcoder::TranscoderSpawner;

/// Builds the axum [`Router`] for the full HTTP surface, given a composed
/// [`AppState`]. Split out from `main` so integration tests can bind an
/// ephemeral listener and drive the real router without a full process
/// startup.
///
/// `/stream` is meant to be embedded directly in an `<audio>` tag on pages
/// served from a different origin than this server, so CORS is permissive
/// rather than allowlist-based.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stream", get(handlers::stream))
        .route("/command", post(handlers::command))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Convenience constructor used by both `main` and integration tests:
/// wires a `Registry` and `TranscoderSpawner` into a fresh `AppState` and
/// returns the router alongside it so tests can still reach into the state
/// (e.g. to assert on `StreamerRegistry` contents).
pub fn create_app(
    config: Config,
    registry: Arc<dyn Registry>,
    spawner: Arc<dyn TranscoderSpawner>,
) -> (Router, AppState) {
    let state = AppState::new(config, registry, spawner);
    (router(state.clone()), state)
}
