use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::state::SharedState;

/// Advance the game session at the configured rate until shutdown.
pub async fn run(state: SharedState) {
    let period = state.config().tick_interval();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut shutdown = state.shutdown_watcher();

    info!(period_ms = period.as_millis() as u64, "game loop started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.advance_game().await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("game loop stopped");
}
