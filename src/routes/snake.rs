use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::{
        command::{CommandAck, PlayerCommand},
        game::GameFrame,
    },
    error::AppError,
    services::command_service,
    state::SharedState,
};

/// Command intake and game polling routes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/snake", get(current_game))
        .route("/snake/move", post(submit_command))
}

/// Queue a move or reset for the next tick.
#[utoipa::path(
    post,
    path = "/snake/move",
    tag = "snake",
    request_body = PlayerCommand,
    responses(
        (status = 202, description = "Command queued", body = CommandAck),
        (status = 400, description = "Invalid command")
    )
)]
pub async fn submit_command(
    State(state): State<SharedState>,
    body: String,
) -> Result<(StatusCode, Json<CommandAck>), AppError> {
    command_service::submit_json(&state, &body).await?;
    Ok((StatusCode::ACCEPTED, Json(CommandAck::queued())))
}

/// Latest published game state.
#[utoipa::path(
    get,
    path = "/snake",
    tag = "snake",
    responses((status = 200, description = "Latest game frame", body = GameFrame))
)]
pub async fn current_game(State(state): State<SharedState>) -> Result<Json<GameFrame>, AppError> {
    state
        .game_hub()
        .latest()
        .map(|frame| Json(GameFrame::from(&frame)))
        .ok_or_else(|| AppError::Internal("no game state published".into()))
}
