use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/monitor",
    tag = "sse",
    responses((status = 200, description = "Monitoring snapshots", content_type = "text/event-stream", body = String))
)]
/// Stream monitoring snapshots, starting with the current one.
pub async fn monitor_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let subscription = state.monitor_hub().subscribe();
    info!(subscriber = %subscription.id(), "new monitor SSE connection");
    sse_service::to_sse_stream(subscription)
}

#[utoipa::path(
    get,
    path = "/sse/snake",
    tag = "sse",
    responses((status = 200, description = "Game frames", content_type = "text/event-stream", body = String))
)]
/// Stream game frames, starting with the current one.
pub async fn game_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let subscription = state.game_hub().subscribe();
    info!(subscriber = %subscription.id(), "new game SSE connection");
    sse_service::to_sse_stream(subscription)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/monitor", get(monitor_stream))
        .route("/sse/snake", get(game_stream))
}
