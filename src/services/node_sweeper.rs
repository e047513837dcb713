use time::OffsetDateTime;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::state::SharedState;

/// Periodically evict nodes that stopped heartbeating, until shutdown.
pub async fn run(state: SharedState) {
    let config = state.config();
    let mut ticker = interval(config.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shutdown = state.shutdown_watcher();

    info!(
        timeout_ms = config.node_timeout().as_millis() as u64,
        "stale node sweeper started"
    );
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.sweep_stale_nodes(OffsetDateTime::now_utc()).await;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("stale node sweeper stopped");
}
