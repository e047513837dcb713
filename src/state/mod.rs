pub mod game;
pub mod hub;
pub mod intake;
pub mod ledger;
pub mod monitor;
pub mod registry;
pub mod results;

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{info, warn};

use crate::config::AppConfig;

use self::{
    game::{GameSession, TickOutcome},
    hub::BroadcastHub,
    intake::{CommandIntake, PendingIntents},
    monitor::{Monitor, Snapshot},
    registry::Node,
};

pub type SharedState = Arc<AppState>;

/// Central application state: the monitoring authority, the game session and
/// the two hubs publishing them.
pub struct AppState {
    config: Arc<AppConfig>,
    monitor: RwLock<Monitor>,
    monitor_hub: BroadcastHub<Snapshot>,
    game: Mutex<GameSession>,
    game_hub: BroadcastHub<GameSession>,
    intake: CommandIntake,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Both hubs are seeded so the first subscriber immediately gets a full state.
    pub fn new(config: AppConfig) -> SharedState {
        let config = Arc::new(config);
        let monitor = Monitor::new(config.overload_threshold_pct());
        let session = GameSession::new(config.board(), &mut rand::rng());

        let monitor_hub = BroadcastHub::new(
            "monitor",
            config.subscriber_queue_capacity(),
            config.subscriber_max_dropped(),
        );
        let game_hub = BroadcastHub::new(
            "game",
            config.subscriber_queue_capacity(),
            config.subscriber_max_dropped(),
        );
        monitor_hub.publish(monitor.snapshot());
        game_hub.publish(session.clone());

        let (shutdown, _rx) = watch::channel(false);
        Arc::new(Self {
            config,
            monitor: RwLock::new(monitor),
            monitor_hub,
            game: Mutex::new(session),
            game_hub,
            intake: CommandIntake::new(),
            shutdown,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// Hub publishing monitoring snapshots.
    pub fn monitor_hub(&self) -> &BroadcastHub<Snapshot> {
        &self.monitor_hub
    }

    /// Hub publishing game states.
    pub fn game_hub(&self) -> &BroadcastHub<GameSession> {
        &self.game_hub
    }

    /// Buffer of player intents awaiting the next tick.
    pub fn intake(&self) -> &CommandIntake {
        &self.intake
    }

    /// Run a read-only closure against the monitoring state.
    pub async fn read_monitor<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&Monitor) -> T,
    {
        let guard = self.monitor.read().await;
        f(&*guard)
    }

    /// Run a mutation against the monitoring state and publish a fresh snapshot when it succeeds.
    ///
    /// The snapshot is published while the write lock is still held, so snapshot
    /// versions follow mutation order.
    pub async fn update_monitor<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Monitor) -> Result<T, E>,
    {
        let mut guard = self.monitor.write().await;
        let value = f(&mut *guard)?;
        self.monitor_hub.publish(guard.snapshot());
        Ok(value)
    }

    /// Evict nodes whose last heartbeat is older than the configured timeout.
    pub async fn sweep_stale_nodes(&self, now: OffsetDateTime) -> Vec<Node> {
        let mut guard = self.monitor.write().await;
        let evicted = guard.sweep_stale(now, self.config.node_timeout());
        if !evicted.is_empty() {
            for node in &evicted {
                info!(node_id = %node.id, "evicted stale node");
            }
            self.monitor_hub.publish(guard.snapshot());
        }
        evicted
    }

    /// Apply the buffered intents, advance the session by one tick and publish it.
    ///
    /// Returns `None` when the tick was spent on a reset.
    pub async fn advance_game(&self) -> Option<TickOutcome> {
        let intents = self.intake.drain().await;
        let mut session = self.game.lock().await;
        let outcome = step_session(&mut session, intents);
        match outcome {
            None => info!("game session reset"),
            Some(TickOutcome::Ended(reason)) => {
                info!(reason = ?reason, score = session.score(), tick = session.tick_count(), "game over");
            }
            Some(_) => {}
        }
        self.game_hub.publish(session.clone());
        outcome
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Receiver flipping to `true` once shutdown starts.
    pub fn shutdown_watcher(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Stop background loops and end every subscription.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        self.monitor_hub.close();
        self.game_hub.close();
    }
}

fn step_session(session: &mut GameSession, intents: PendingIntents) -> Option<TickOutcome> {
    let mut rng = rand::rng();
    if intents.reset {
        session.reset(&mut rng);
    }
    for action in intents.scenario {
        if let Err(err) = session.apply_scenario(action, &mut rng) {
            warn!(action = ?action, error = %err, "scenario edit skipped");
        }
    }
    if let Some(direction) = intents.direction {
        session.apply_move(direction);
    }
    if intents.reset {
        return None;
    }
    Some(session.tick(&mut rng))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use time::Duration;

    use super::*;
    use crate::state::{
        game::{Cell, Direction, ScenarioAction},
        ledger::LedgerError,
        registry::NodeStats,
    };

    fn stats() -> NodeStats {
        NodeStats {
            cpu_pct: 10.0,
            ram_pct: 10.0,
            disk_pct: 10.0,
            active_tasks: 0,
        }
    }

    #[tokio::test]
    async fn hubs_are_seeded() {
        let state = AppState::new(AppConfig::default());
        let mut monitor = state.monitor_hub().subscribe();
        let mut game = state.game_hub().subscribe();

        let first = monitor.recv().await.unwrap();
        assert_eq!(first.version, 1);
        assert!(first.payload.nodes.is_empty());
        assert!(first.payload.tasks_by_node.is_empty());
        assert_eq!(game.recv().await.unwrap().payload.tick_count(), 0);
    }

    #[tokio::test]
    async fn failed_mutation_publishes_nothing() {
        let state = AppState::new(AppConfig::default());
        let now = OffsetDateTime::UNIX_EPOCH;

        state
            .update_monitor(|m| m.assign_task("t1", "n1", "a", now))
            .await
            .unwrap();
        let version = state.monitor_hub().version();

        let err = state
            .update_monitor(|m| m.assign_task("t1", "n2", "b", now))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyExists("t1".into()));
        assert_eq!(state.monitor_hub().version(), version);
    }

    #[tokio::test]
    async fn sweep_publishes_only_on_eviction() {
        let state = AppState::new(AppConfig::default());
        let t0 = OffsetDateTime::UNIX_EPOCH;
        state
            .update_monitor(|m| Ok::<_, LedgerError>(m.heartbeat("n1", stats(), t0)))
            .await
            .unwrap();
        let version = state.monitor_hub().version();

        assert!(state.sweep_stale_nodes(t0 + Duration::seconds(2)).await.is_empty());
        assert_eq!(state.monitor_hub().version(), version);

        let evicted = state.sweep_stale_nodes(t0 + Duration::seconds(6)).await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(state.monitor_hub().version(), version + 1);
        assert!(state.read_monitor(|m| m.nodes()).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_create_one_result_per_task() {
        let state = AppState::new(AppConfig::default());
        let t0 = OffsetDateTime::UNIX_EPOCH;
        for i in 0..10 {
            state
                .update_monitor(|m| m.assign_task(&format!("t{i}"), "n1", "p", t0))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for attempt in 0..100 {
            let state = state.clone();
            handles.push(tokio::spawn(async move {
                let task_id = format!("t{}", attempt % 10);
                state
                    .update_monitor(|m| m.complete_task(&task_id, t0 + Duration::seconds(1)))
                    .await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        let results = state.read_monitor(|m| m.snapshot().results).await;
        assert_eq!(accepted, 10);
        assert_eq!(results.len(), 10);
        let ids: HashSet<_> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn reversal_within_a_tick_changes_nothing() {
        let state = AppState::new(AppConfig::default());
        state.intake().submit_move(Direction::Up).await;
        state.intake().submit_move(Direction::Down).await;

        state.advance_game().await;
        let latest = state.game_hub().latest().unwrap();
        assert_eq!(latest.payload.direction(), Direction::Down);
        assert_eq!(latest.payload.snake().front(), Some(&Cell::new(5, 6)));
    }

    #[tokio::test]
    async fn reset_tick_publishes_initial_state() {
        let state = AppState::new(AppConfig::default());
        state.advance_game().await;
        state.advance_game().await;

        state.intake().submit_move(Direction::Left).await;
        state.intake().submit_reset().await;
        assert_eq!(state.advance_game().await, None);

        let latest = state.game_hub().latest().unwrap();
        assert_eq!(latest.payload.tick_count(), 0);
        assert_eq!(latest.payload.snake().front(), Some(&Cell::new(5, 5)));
        assert_eq!(latest.payload.pending_direction(), Direction::Down);
        assert_eq!(latest.version, 4);
    }

    #[tokio::test]
    async fn scenario_edits_land_before_the_tick() {
        let state = AppState::new(AppConfig::default());
        state
            .intake()
            .submit_scenario(ScenarioAction::AddFood(Some(Cell::new(5, 6))))
            .await;
        state
            .intake()
            .submit_scenario(ScenarioAction::AddObstacle(Some(Cell::new(5, 6))))
            .await;
        state
            .intake()
            .submit_scenario(ScenarioAction::AddObstacle(Some(Cell::new(0, 0))))
            .await;

        assert_eq!(state.advance_game().await, Some(TickOutcome::Ate));
        let latest = state.game_hub().latest().unwrap();
        assert_eq!(latest.payload.score(), 1);
        let obstacles: Vec<_> = latest.payload.obstacles().iter().copied().collect();
        assert_eq!(obstacles, vec![Cell::new(0, 0)]);

        state
            .intake()
            .submit_scenario(ScenarioAction::ClearObstacles)
            .await;
        state.advance_game().await;
        assert!(state.game_hub().latest().unwrap().payload.obstacles().is_empty());
    }

    #[tokio::test]
    async fn shutdown_closes_subscriptions() {
        let state = AppState::new(AppConfig::default());
        let mut subscription = state.monitor_hub().subscribe();
        let mut watcher = state.shutdown_watcher();
        subscription.recv().await.unwrap();

        state.shutdown();
        assert!(subscription.recv().await.is_none());
        assert!(state.is_shutting_down());
        assert!(watcher.has_changed().unwrap());
    }
}
