use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the fleetdeck backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::monitor::heartbeat,
        crate::routes::monitor::list_nodes,
        crate::routes::monitor::best_node,
        crate::routes::monitor::list_evicted_nodes,
        crate::routes::monitor::assign_task,
        crate::routes::monitor::list_tasks,
        crate::routes::monitor::get_task,
        crate::routes::monitor::start_task,
        crate::routes::monitor::complete_task,
        crate::routes::monitor::list_results,
        crate::routes::monitor::snapshot,
        crate::routes::snake::submit_command,
        crate::routes::snake::current_game,
        crate::routes::sse::monitor_stream,
        crate::routes::sse::game_stream,
        crate::routes::websocket::monitor_ws,
        crate::routes::websocket::game_ws,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::monitor::HeartbeatRequest,
            crate::dto::monitor::AssignTaskRequest,
            crate::dto::monitor::NodeStatusDto,
            crate::dto::monitor::NodeView,
            crate::dto::monitor::NodeMap,
            crate::dto::monitor::BestNodeResponse,
            crate::dto::monitor::TaskStatusDto,
            crate::dto::monitor::TaskView,
            crate::dto::monitor::TaskBuckets,
            crate::dto::monitor::ResultView,
            crate::dto::monitor::ResultBuckets,
            crate::dto::monitor::ResultOrderParam,
            crate::dto::monitor::MonitorFrame,
            crate::dto::command::DirectionDto,
            crate::dto::command::ScenarioActionDto,
            crate::dto::command::PlayerCommand,
            crate::dto::command::CommandAck,
            crate::dto::command::CommandRejected,
            crate::dto::game::GameOverReasonDto,
            crate::dto::game::GridDto,
            crate::dto::game::GameFrame,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "monitor", description = "Node heartbeats, task ledger and results"),
        (name = "snake", description = "Player commands and game polling"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "websocket", description = "WebSocket push channels"),
    )
)]
pub struct ApiDoc;
