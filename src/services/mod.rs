/// Player command intake.
pub mod command_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Fixed-rate game tick loop.
pub mod game_loop;
/// Health check service.
pub mod health_service;
/// Node, task and result operations.
pub mod monitor_service;
/// Periodic eviction of silent nodes.
pub mod node_sweeper;
/// Server-Sent Events streaming of hub subscriptions.
pub mod sse_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
