//! Buffer between player commands and the tick loop.

use tokio::sync::Mutex;

use crate::state::game::{Direction, ScenarioAction};

/// Intents collected since the previous tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingIntents {
    /// A reset was requested.
    pub reset: bool,
    /// Last move requested after any reset.
    pub direction: Option<Direction>,
    /// Board edits requested after any reset, in arrival order.
    pub scenario: Vec<ScenarioAction>,
}

/// Accepts commands at any rate; the tick loop drains them once per tick.
#[derive(Debug, Default)]
pub struct CommandIntake {
    pending: Mutex<PendingIntents>,
}

impl CommandIntake {
    /// Create an empty intake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a move. Within one tick the last move wins.
    pub async fn submit_move(&self, direction: Direction) {
        self.pending.lock().await.direction = Some(direction);
    }

    /// Buffer a board edit. Every edit of a tick is applied, in order.
    pub async fn submit_scenario(&self, action: ScenarioAction) {
        self.pending.lock().await.scenario.push(action);
    }

    /// Buffer a reset. Moves and edits submitted earlier in the same tick are discarded.
    pub async fn submit_reset(&self) {
        let mut pending = self.pending.lock().await;
        pending.reset = true;
        pending.direction = None;
        pending.scenario.clear();
    }

    /// Take everything buffered so far, leaving the intake empty.
    pub async fn drain(&self) -> PendingIntents {
        std::mem::take(&mut *self.pending.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_move_wins() {
        let intake = CommandIntake::new();
        intake.submit_move(Direction::Left).await;
        intake.submit_move(Direction::Up).await;

        let drained = intake.drain().await;
        assert_eq!(drained.direction, Some(Direction::Up));
        assert!(!drained.reset);
        assert_eq!(intake.drain().await, PendingIntents::default());
    }

    #[tokio::test]
    async fn reset_discards_earlier_moves_only() {
        let intake = CommandIntake::new();
        intake.submit_move(Direction::Left).await;
        intake.submit_reset().await;
        intake.submit_move(Direction::Right).await;

        let drained = intake.drain().await;
        assert!(drained.reset);
        assert_eq!(drained.direction, Some(Direction::Right));
    }

    #[tokio::test]
    async fn scenario_edits_keep_arrival_order() {
        let intake = CommandIntake::new();
        intake.submit_scenario(ScenarioAction::ClearObstacles).await;
        intake.submit_reset().await;
        intake.submit_scenario(ScenarioAction::AddFood(None)).await;
        intake.submit_scenario(ScenarioAction::ClearObstacles).await;

        let drained = intake.drain().await;
        assert!(drained.reset);
        assert_eq!(
            drained.scenario,
            vec![ScenarioAction::AddFood(None), ScenarioAction::ClearObstacles]
        );
        assert!(intake.drain().await.scenario.is_empty());
    }
}
