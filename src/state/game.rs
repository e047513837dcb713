//! Grid game session advanced by a fixed-rate tick.

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use indexmap::IndexSet;
use rand::{Rng, seq::IndexedRandom};
use thiserror::Error;

/// Integer board coordinate. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Cell {
    /// Build a cell from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Heading of the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards row 0.
    Up,
    /// Towards the last row.
    Down,
    /// Towards column 0.
    Left,
    /// Towards the last column.
    Right,
}

impl Direction {
    /// The 180° reversal of this direction.
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    /// The head left the grid.
    Wall,
    /// The head hit a configured obstacle.
    Obstacle,
    /// The head hit the snake's own body.
    SelfCollision,
    /// No free cell was left to place food on.
    BoardFull,
}

/// High-level session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The snake advances on every tick.
    Running,
    /// The session stopped; only a reset brings it back.
    GameOver(GameOverReason),
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The snake moved one cell.
    Moved,
    /// The snake ate and grew.
    Ate,
    /// The session ended on this tick.
    Ended(GameOverReason),
    /// Nothing happened because the session is already over.
    Idle,
}

/// Edit of the board applied between two ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioAction {
    /// Move the food to the given cell, or to a random free one.
    AddFood(Option<Cell>),
    /// Add a wall on the given cell, or on a random free one.
    AddObstacle(Option<Cell>),
    /// Remove every wall, configured ones included, until the next reset.
    ClearObstacles,
}

/// Why a scenario action left the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScenarioError {
    /// Target outside the grid.
    #[error("cell ({}, {}) is outside the grid", .0.x, .0.y)]
    OutOfBounds(Cell),
    /// Target holds the snake, the food or a wall.
    #[error("cell ({}, {}) is already taken", .0.x, .0.y)]
    Occupied(Cell),
    /// Random placement found nothing free.
    #[error("no free cell left")]
    NoFreeCell,
}

/// Fixed geometry of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Number of columns.
    pub width: i32,
    /// Number of rows.
    pub height: i32,
    /// Head position of a fresh snake.
    pub start: Cell,
    /// Length of a fresh snake.
    pub initial_length: usize,
    /// Heading of a fresh snake; its body trails in the opposite direction.
    pub initial_direction: Direction,
    /// Wall cells a fresh session starts with.
    pub obstacles: Vec<Cell>,
}

impl Board {
    /// Whether `cell` lies inside the grid.
    pub fn contains(&self, cell: Cell) -> bool {
        (0..self.width).contains(&cell.x) && (0..self.height).contains(&cell.y)
    }

    /// Cells of a fresh snake, head first.
    pub fn initial_snake(&self) -> VecDeque<Cell> {
        let trail = self.initial_direction.opposite();
        std::iter::successors(Some(self.start), |cell| Some(cell.step(trail)))
            .take(self.initial_length.max(1))
            .collect()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self {
            width: 20,
            height: 20,
            start: Cell::new(5, 5),
            initial_length: 3,
            initial_direction: Direction::Down,
            obstacles: Vec::new(),
        }
    }
}

/// One running instance of the grid game. Mutated only by the tick loop.
#[derive(Debug, Clone)]
pub struct GameSession {
    board: Arc<Board>,
    snake: VecDeque<Cell>,
    food: Option<Cell>,
    obstacles: IndexSet<Cell>,
    direction: Direction,
    pending_direction: Direction,
    score: u32,
    state: SessionState,
    tick: u64,
}

impl GameSession {
    /// Start a fresh session on `board`.
    pub fn new(board: Arc<Board>, rng: &mut impl Rng) -> Self {
        let direction = board.initial_direction;
        let mut session = Self {
            snake: board.initial_snake(),
            obstacles: board.obstacles.iter().copied().collect(),
            board,
            food: None,
            direction,
            pending_direction: direction,
            score: 0,
            state: SessionState::Running,
            tick: 0,
        };
        session.respawn_food(rng);
        session
    }

    /// Reinitialise every field to the starting state, obstacles included.
    pub fn reset(&mut self, rng: &mut impl Rng) {
        *self = Self::new(Arc::clone(&self.board), rng);
    }

    /// Buffer a heading change for the next tick. The snake itself is untouched.
    pub fn apply_move(&mut self, direction: Direction) {
        self.pending_direction = direction;
    }

    /// Edit food or walls. Snake, food and walls never share a cell afterwards.
    pub fn apply_scenario(
        &mut self,
        action: ScenarioAction,
        rng: &mut impl Rng,
    ) -> Result<(), ScenarioError> {
        match action {
            ScenarioAction::AddFood(target) => {
                let cell = match target {
                    Some(cell) => self.check_free(cell, None)?,
                    None => self.random_free_cell(None, rng)?,
                };
                self.food = Some(cell);
            }
            ScenarioAction::AddObstacle(target) => {
                let cell = match target {
                    Some(cell) => self.check_free(cell, self.food)?,
                    None => self.random_free_cell(self.food, rng)?,
                };
                self.obstacles.insert(cell);
            }
            ScenarioAction::ClearObstacles => self.obstacles.clear(),
        }
        Ok(())
    }

    /// Advance the session by one step.
    pub fn tick(&mut self, rng: &mut impl Rng) -> TickOutcome {
        if self.state != SessionState::Running {
            return TickOutcome::Idle;
        }

        if self.pending_direction != self.direction.opposite() {
            self.direction = self.pending_direction;
        }
        self.pending_direction = self.direction;
        self.tick += 1;

        let Some(&head) = self.snake.front() else {
            return self.end(GameOverReason::SelfCollision);
        };
        let next = head.step(self.direction);

        if !self.board.contains(next) {
            return self.end(GameOverReason::Wall);
        }
        if self.obstacles.contains(&next) {
            return self.end(GameOverReason::Obstacle);
        }
        if self.snake.contains(&next) {
            return self.end(GameOverReason::SelfCollision);
        }

        self.snake.push_front(next);
        if self.food == Some(next) {
            self.score += 1;
            if !self.respawn_food(rng) {
                return self.end(GameOverReason::BoardFull);
            }
            TickOutcome::Ate
        } else {
            self.snake.pop_back();
            TickOutcome::Moved
        }
    }

    /// Snake cells, head first.
    pub fn snake(&self) -> &VecDeque<Cell> {
        &self.snake
    }

    /// Current food cell; `None` only once the board is full.
    pub fn food(&self) -> Option<Cell> {
        self.food
    }

    /// Current heading.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Heading buffered for the next tick.
    pub fn pending_direction(&self) -> Direction {
        self.pending_direction
    }

    /// Food eaten so far.
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Running or over.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session has ended.
    pub fn is_over(&self) -> bool {
        matches!(self.state, SessionState::GameOver(_))
    }

    /// Number of ticks the snake advanced since the last reset.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Wall cells, in insertion order.
    pub fn obstacles(&self) -> &IndexSet<Cell> {
        &self.obstacles
    }

    /// Geometry of this session.
    pub fn board(&self) -> &Board {
        &self.board
    }

    fn end(&mut self, reason: GameOverReason) -> TickOutcome {
        self.state = SessionState::GameOver(reason);
        TickOutcome::Ended(reason)
    }

    /// Place food uniformly on a free cell. Returns `false` when none is left.
    fn respawn_food(&mut self, rng: &mut impl Rng) -> bool {
        self.food = self.random_free_cell(None, rng).ok();
        self.food.is_some()
    }

    fn is_taken(&self, cell: Cell, also: Option<Cell>) -> bool {
        also == Some(cell) || self.obstacles.contains(&cell) || self.snake.contains(&cell)
    }

    fn check_free(&self, cell: Cell, also: Option<Cell>) -> Result<Cell, ScenarioError> {
        if !self.board.contains(cell) {
            return Err(ScenarioError::OutOfBounds(cell));
        }
        if self.is_taken(cell, also) {
            return Err(ScenarioError::Occupied(cell));
        }
        Ok(cell)
    }

    /// Uniform pick among cells free of snake, walls and `also`.
    fn random_free_cell(
        &self,
        also: Option<Cell>,
        rng: &mut impl Rng,
    ) -> Result<Cell, ScenarioError> {
        let body: HashSet<Cell> = self.snake.iter().copied().collect();
        let free: Vec<Cell> = (0..self.board.height)
            .flat_map(|y| (0..self.board.width).map(move |x| Cell::new(x, y)))
            .filter(|cell| {
                also != Some(*cell) && !body.contains(cell) && !self.obstacles.contains(cell)
            })
            .collect();
        free.choose(rng).copied().ok_or(ScenarioError::NoFreeCell)
    }
}
