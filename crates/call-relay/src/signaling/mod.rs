//! WebSocket signaling surface.
//!
//! - [`protocol`] - the wire envelopes
//! - [`dispatcher`] - the (state, kind) routing table
//! - [`connection`] - the upgrade handler and per-connection loop

pub mod connection;
pub mod dispatcher;
pub mod protocol;

pub use connection::{ws_handler, SignalingState};

use axum::routing::get;
use axum::Router;

/// Fixed upgrade path for the signaling service.
pub const SIGNALING_PATH: &str = "/signal";

/// Build the signaling router.
pub fn router(state: SignalingState) -> Router {
    Router::new()
        .route(SIGNALING_PATH, get(ws_handler))
        .with_state(state)
}
