use tracing::{debug, warn};

use crate::{
    dto::command::{CommandError, PlayerCommand},
    error::ServiceError,
    state::{SharedState, game::ScenarioAction},
};

/// Buffer a validated command for the next tick. Never waits on the tick itself.
pub async fn submit(state: &SharedState, command: PlayerCommand) -> Result<(), ServiceError> {
    if state.is_shutting_down() {
        return Err(ServiceError::Unavailable("server is shutting down".into()));
    }

    match command {
        PlayerCommand::Move {
            player_id,
            direction,
            ..
        } => {
            debug!(player_id = %player_id, direction = ?direction, "move queued");
            state.intake().submit_move(direction.into()).await;
        }
        PlayerCommand::Reset { player_id, .. } => {
            debug!(player_id = %player_id, "reset queued");
            state.intake().submit_reset().await;
        }
        PlayerCommand::Scenario {
            player_id,
            action,
            position,
            ..
        } => {
            let action = action.at(position);
            if let ScenarioAction::AddFood(Some(cell)) | ScenarioAction::AddObstacle(Some(cell)) =
                action
            {
                if !state.config().board().contains(cell) {
                    return Err(CommandError::InvalidCommand(format!(
                        "position ({}, {}) is outside the grid",
                        cell.x, cell.y
                    ))
                    .into());
                }
            }
            debug!(player_id = %player_id, action = ?action, "scenario edit queued");
            state.intake().submit_scenario(action).await;
        }
    }
    Ok(())
}

/// Parse raw command text and buffer it. Rejections leave the session untouched.
pub async fn submit_json(state: &SharedState, payload: &str) -> Result<(), ServiceError> {
    let command = PlayerCommand::from_json_str(payload).inspect_err(|err: &CommandError| {
        warn!(error = %err, "rejected player command");
    })?;
    submit(state, command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        state::{
            AppState,
            game::{Cell, Direction},
            intake::PendingIntents,
        },
    };

    #[tokio::test]
    async fn valid_commands_are_buffered() {
        let state = AppState::new(AppConfig::default());
        submit_json(
            &state,
            r#"{"type":"snake_move","player_id":"p1","direction":"left","timestamp":1}"#,
        )
        .await
        .unwrap();
        submit_json(
            &state,
            r#"{"type":"snake_move","player_id":"p2","direction":"right","timestamp":2}"#,
        )
        .await
        .unwrap();

        let pending = state.intake().drain().await;
        assert_eq!(pending.direction, Some(Direction::Right));
    }

    #[tokio::test]
    async fn invalid_commands_change_nothing() {
        let state = AppState::new(AppConfig::default());
        let err = submit_json(&state, r#"{"type":"snake_move","player_id":"p1"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(state.intake().drain().await, PendingIntents::default());
    }

    #[tokio::test]
    async fn scenario_updates_are_buffered_in_order() {
        let state = AppState::new(AppConfig::default());
        for payload in [
            r#"{"type":"scenario_update","player_id":"p1","action":"add_food","position":[2,2]}"#,
            r#"{"type":"scenario_update","player_id":"p1","action":"add_obstacle"}"#,
            r#"{"type":"scenario_update","player_id":"p1","action":"clear_obstacles"}"#,
        ] {
            submit_json(&state, payload).await.unwrap();
        }

        let pending = state.intake().drain().await;
        assert_eq!(
            pending.scenario,
            vec![
                ScenarioAction::AddFood(Some(Cell::new(2, 2))),
                ScenarioAction::AddObstacle(None),
                ScenarioAction::ClearObstacles,
            ]
        );
    }

    #[tokio::test]
    async fn scenario_position_outside_grid_is_rejected() {
        let state = AppState::new(AppConfig::default());
        let err = submit_json(
            &state,
            r#"{"type":"scenario_update","player_id":"p1","action":"add_obstacle","position":[20,3]}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(state.intake().drain().await, PendingIntents::default());
    }

    #[tokio::test]
    async fn commands_are_refused_during_shutdown() {
        let state = AppState::new(AppConfig::default());
        state.shutdown();
        let err = submit_json(&state, r#"{"type":"reset_game","player_id":"p1"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
