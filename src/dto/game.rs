use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::command::DirectionDto,
    state::{
        game::{Cell, GameOverReason, GameSession, SessionState},
        hub::Versioned,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Cause of a game over.
pub enum GameOverReasonDto {
    /// The snake left the grid.
    Wall,
    /// The snake hit an obstacle.
    Obstacle,
    /// The snake hit itself.
    SelfCollision,
    /// No free cell was left for food.
    BoardFull,
}

impl From<GameOverReason> for GameOverReasonDto {
    fn from(value: GameOverReason) -> Self {
        match value {
            GameOverReason::Wall => GameOverReasonDto::Wall,
            GameOverReason::Obstacle => GameOverReasonDto::Obstacle,
            GameOverReason::SelfCollision => GameOverReasonDto::SelfCollision,
            GameOverReason::BoardFull => GameOverReasonDto::BoardFull,
        }
    }
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct GridDto {
    /// Number of columns.
    pub width: i32,
    /// Number of rows.
    pub height: i32,
}

/// Game state pushed on every tick.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GameFrame {
    /// Frame version; never decreases for a given subscriber.
    pub version: u64,
    /// Snake cells as `[x, y]`, head first.
    pub snake: Vec<[i32; 2]>,
    /// Food cell, absent once the board is full.
    pub food: Option<[i32; 2]>,
    /// Food eaten since the last reset.
    pub score: u32,
    /// Whether the session has ended.
    pub game_over: bool,
    /// Why the session ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<GameOverReasonDto>,
    /// Current heading.
    pub direction: DirectionDto,
    /// Ticks advanced since the last reset.
    pub tick: u64,
    /// Wall cells currently on the grid.
    pub obstacles: Vec<[i32; 2]>,
    /// Board size.
    pub grid: GridDto,
}

fn pair(cell: &Cell) -> [i32; 2] {
    [cell.x, cell.y]
}

impl GameFrame {
    /// Render a session published under `version`.
    pub fn new(version: u64, session: &GameSession) -> Self {
        let board = session.board();
        let reason = match session.state() {
            SessionState::Running => None,
            SessionState::GameOver(reason) => Some(reason.into()),
        };

        Self {
            version,
            snake: session.snake().iter().map(pair).collect(),
            food: session.food().as_ref().map(pair),
            score: session.score(),
            game_over: session.is_over(),
            reason,
            direction: session.direction().into(),
            tick: session.tick_count(),
            obstacles: session.obstacles().iter().map(pair).collect(),
            grid: GridDto {
                width: board.width,
                height: board.height,
            },
        }
    }
}

impl From<&Versioned<GameSession>> for GameFrame {
    fn from(frame: &Versioned<GameSession>) -> Self {
        Self::new(frame.version, &frame.payload)
    }
}
