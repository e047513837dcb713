use crate::{dto::health::HealthResponse, state::SharedState};

/// Report subscriber counts and the size of the live node set.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let live_nodes = state.read_monitor(|monitor| monitor.nodes().len()).await;

    if state.is_shutting_down() {
        HealthResponse::shutting_down(live_nodes)
    } else {
        HealthResponse::ok(
            state.monitor_hub().subscriber_count(),
            state.game_hub().subscriber_count(),
            live_nodes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn counts_subscribers() {
        let state = AppState::new(AppConfig::default());
        let _monitor = state.monitor_hub().subscribe();
        let _game_a = state.game_hub().subscribe();
        let _game_b = state.game_hub().subscribe();

        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.monitor_subscribers, 1);
        assert_eq!(health.game_subscribers, 2);
        assert_eq!(health.live_nodes, 0);

        state.shutdown();
        assert_eq!(health_status(&state).await.status, "shutting_down");
    }
}
