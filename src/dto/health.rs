use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "shutting_down").
    pub status: String,
    /// Subscribers of the monitoring channel.
    pub monitor_subscribers: usize,
    /// Subscribers of the game channel.
    pub game_subscribers: usize,
    /// Nodes currently in the live set.
    pub live_nodes: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(monitor_subscribers: usize, game_subscribers: usize, live_nodes: usize) -> Self {
        Self {
            status: "ok".to_string(),
            monitor_subscribers,
            game_subscribers,
            live_nodes,
        }
    }

    /// Create a health response indicating the server is draining connections.
    pub fn shutting_down(live_nodes: usize) -> Self {
        Self {
            status: "shutting_down".to_string(),
            monitor_subscribers: 0,
            game_subscribers: 0,
            live_nodes,
        }
    }
}
