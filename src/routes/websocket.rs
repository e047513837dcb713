use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "websocket",
    responses((status = 101, description = "Switching protocols to the monitoring WebSocket"))
)]
/// Upgrade the HTTP connection into a monitoring push channel.
pub async fn monitor_ws(
    State(state): State<SharedState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_monitor_socket(state, socket))
}

#[utoipa::path(
    get,
    path = "/ws/snake",
    tag = "websocket",
    responses((status = 101, description = "Switching protocols to the game WebSocket"))
)]
/// Upgrade the HTTP connection into a game channel that also accepts commands.
pub async fn game_ws(State(state): State<SharedState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_game_socket(state, socket))
}

/// Configure the WebSocket endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/ws", get(monitor_ws))
        .route("/ws/snake", get(game_ws))
}
