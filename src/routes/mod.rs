use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod monitor;
pub mod snake;
pub mod sse;
pub mod websocket;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(monitor::router())
        .merge(snake::router())
        .merge(sse::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
