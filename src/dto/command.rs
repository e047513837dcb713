use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dto::validation::validate_player_id,
    state::game::{Cell, Direction, ScenarioAction},
};

/// Rejection raised when a player command cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The payload is not a well-formed command.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
/// Heading requested by a player.
pub enum DirectionDto {
    /// Towards row 0.
    Up,
    /// Towards the last row.
    Down,
    /// Towards column 0.
    Left,
    /// Towards the last column.
    Right,
}

impl From<DirectionDto> for Direction {
    fn from(value: DirectionDto) -> Self {
        match value {
            DirectionDto::Up => Direction::Up,
            DirectionDto::Down => Direction::Down,
            DirectionDto::Left => Direction::Left,
            DirectionDto::Right => Direction::Right,
        }
    }
}

impl From<Direction> for DirectionDto {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Up => DirectionDto::Up,
            Direction::Down => DirectionDto::Down,
            Direction::Left => DirectionDto::Left,
            Direction::Right => DirectionDto::Right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Board edit carried by a `scenario_update` command.
pub enum ScenarioActionDto {
    /// Move the food, to `position` or a random free cell.
    AddFood,
    /// Add a wall, on `position` or a random free cell.
    AddObstacle,
    /// Remove every wall until the next reset.
    ClearObstacles,
}

impl ScenarioActionDto {
    /// Combine with the optional `[x, y]` target. `clear_obstacles` ignores it.
    pub fn at(self, position: Option<[i32; 2]>) -> ScenarioAction {
        let cell = position.map(|[x, y]| Cell::new(x, y));
        match self {
            ScenarioActionDto::AddFood => ScenarioAction::AddFood(cell),
            ScenarioActionDto::AddObstacle => ScenarioAction::AddObstacle(cell),
            ScenarioActionDto::ClearObstacles => ScenarioAction::ClearObstacles,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
/// Commands accepted from players over HTTP or the game WebSocket.
#[serde(tag = "type")]
pub enum PlayerCommand {
    /// Change the snake heading at the next tick.
    #[serde(rename = "snake_move", alias = "move")]
    Move {
        /// Player issuing the command.
        player_id: String,
        /// Requested heading.
        direction: DirectionDto,
        /// Client-side timestamp, informational only.
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Restart the session from its initial state.
    #[serde(rename = "reset_game", alias = "reset")]
    Reset {
        /// Player issuing the command.
        player_id: String,
        /// Client-side timestamp, informational only.
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Edit food or walls right before the next tick.
    #[serde(rename = "scenario_update", alias = "scenario")]
    Scenario {
        /// Player issuing the command.
        player_id: String,
        /// Edit to apply.
        action: ScenarioActionDto,
        /// Target cell as `[x, y]`; a random free cell when absent.
        #[serde(default)]
        position: Option<[i32; 2]>,
        /// Client-side timestamp, informational only.
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

impl PlayerCommand {
    /// Parse and validate a command received as JSON text.
    pub fn from_json_str(payload: &str) -> Result<Self, CommandError> {
        let command: Self = serde_json::from_str(payload)
            .map_err(|err| CommandError::InvalidCommand(err.to_string()))?;
        validate_player_id(command.player_id())
            .map_err(|err| CommandError::InvalidCommand(err.to_string()))?;
        Ok(command)
    }

    /// Player issuing the command.
    pub fn player_id(&self) -> &str {
        match self {
            Self::Move { player_id, .. }
            | Self::Reset { player_id, .. }
            | Self::Scenario { player_id, .. } => player_id,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Acknowledgement returned once a command is buffered for the next tick.
pub struct CommandAck {
    /// Always `queued`.
    pub status: String,
}

impl CommandAck {
    /// Acknowledgement for a buffered command.
    pub fn queued() -> Self {
        Self {
            status: "queued".into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Sent back on the game WebSocket when a command is rejected.
pub struct CommandRejected {
    /// Always `error`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Reason of the rejection.
    pub message: String,
}

impl From<CommandError> for CommandRejected {
    fn from(err: CommandError) -> Self {
        Self {
            kind: "error".into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_with_both_tags() {
        let command = PlayerCommand::from_json_str(
            r#"{"type":"snake_move","player_id":"p1","direction":"up","timestamp":1700000000}"#,
        )
        .unwrap();
        assert_eq!(
            command,
            PlayerCommand::Move {
                player_id: "p1".into(),
                direction: DirectionDto::Up,
                timestamp: Some(1_700_000_000),
            }
        );

        let command =
            PlayerCommand::from_json_str(r#"{"type":"move","player_id":"p1","direction":"left"}"#)
                .unwrap();
        assert!(matches!(
            command,
            PlayerCommand::Move {
                direction: DirectionDto::Left,
                timestamp: None,
                ..
            }
        ));
    }

    #[test]
    fn parses_reset() {
        let command =
            PlayerCommand::from_json_str(r#"{"type":"reset_game","player_id":"p2"}"#).unwrap();
        assert_eq!(command.player_id(), "p2");
        assert!(matches!(command, PlayerCommand::Reset { .. }));
    }

    #[test]
    fn parses_scenario_updates() {
        let command = PlayerCommand::from_json_str(
            r#"{"type":"scenario_update","player_id":"p1","action":"add_obstacle","position":[3,4]}"#,
        )
        .unwrap();
        let PlayerCommand::Scenario {
            action, position, ..
        } = command
        else {
            panic!("expected a scenario command");
        };
        assert_eq!(
            action.at(position),
            ScenarioAction::AddObstacle(Some(Cell::new(3, 4)))
        );

        let command = PlayerCommand::from_json_str(
            r#"{"type":"scenario_update","player_id":"p1","action":"add_food"}"#,
        )
        .unwrap();
        assert!(matches!(
            command,
            PlayerCommand::Scenario {
                action: ScenarioActionDto::AddFood,
                position: None,
                ..
            }
        ));
        assert_eq!(
            ScenarioActionDto::ClearObstacles.at(Some([1, 1])),
            ScenarioAction::ClearObstacles
        );
    }

    #[test]
    fn rejects_malformed_commands() {
        let rejected = [
            r#"{"type":"snake_move","player_id":"p1"}"#,
            r#"{"type":"snake_move","player_id":"p1","direction":"north"}"#,
            r#"{"type":"teleport","player_id":"p1"}"#,
            r#"{"type":"reset_game"}"#,
            r#"{"type":"reset_game","player_id":""}"#,
            r#"{"type":"scenario_update","player_id":"p1","action":"remove_snake"}"#,
            r#"{"type":"scenario_update","player_id":"p1","action":"add_food","position":[1]}"#,
            r#"{"player_id":"p1","direction":"up"}"#,
            "not json",
        ];
        for payload in rejected {
            assert!(
                matches!(
                    PlayerCommand::from_json_str(payload),
                    Err(CommandError::InvalidCommand(_))
                ),
                "accepted {payload}"
            );
        }
    }
}
