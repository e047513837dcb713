use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::monitor::{
        AssignTaskRequest, BestNodeResponse, HeartbeatRequest, MonitorFrame, NodeMap,
        ResultBuckets, ResultView, ResultsQuery, TaskBuckets, TaskView, TasksQuery,
    },
    error::AppError,
    services::monitor_service,
    state::SharedState,
};

/// Producer-facing ingestion routes and their polling counterparts.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/nodes", get(list_nodes))
        .route("/nodes/best", get(best_node))
        .route("/nodes/evicted", get(list_evicted_nodes))
        .route("/nodes/{node_id}/heartbeat", post(heartbeat))
        .route("/tasks", get(list_tasks).post(assign_task))
        .route("/tasks/{task_id}", get(get_task))
        .route("/tasks/{task_id}/start", post(start_task))
        .route("/tasks/{task_id}/complete", post(complete_task))
        .route("/results", get(list_results))
        .route("/snapshot", get(snapshot))
}

/// Report the resource usage of a node and refresh its liveness.
#[utoipa::path(
    post,
    path = "/nodes/{node_id}/heartbeat",
    tag = "monitor",
    params(("node_id" = String, Path, description = "Identifier of the reporting node")),
    request_body = HeartbeatRequest,
    responses(
        (status = 204, description = "Heartbeat applied"),
        (status = 400, description = "Invalid node id or stats")
    )
)]
pub async fn heartbeat(
    State(state): State<SharedState>,
    Path(node_id): Path<String>,
    Valid(Json(payload)): Valid<Json<HeartbeatRequest>>,
) -> Result<StatusCode, AppError> {
    monitor_service::heartbeat(&state, &node_id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List live nodes keyed by id.
#[utoipa::path(
    get,
    path = "/nodes",
    tag = "monitor",
    responses((status = 200, description = "Live nodes", body = NodeMap))
)]
pub async fn list_nodes(State(state): State<SharedState>) -> Json<NodeMap> {
    Json(monitor_service::list_nodes(&state).await)
}

/// List nodes evicted for missing heartbeats.
#[utoipa::path(
    get,
    path = "/nodes/evicted",
    tag = "monitor",
    responses((status = 200, description = "Evicted nodes, status offline", body = NodeMap))
)]
pub async fn list_evicted_nodes(State(state): State<SharedState>) -> Json<NodeMap> {
    Json(monitor_service::list_evicted_nodes(&state).await)
}

/// Return the least loaded live node.
#[utoipa::path(
    get,
    path = "/nodes/best",
    tag = "monitor",
    responses(
        (status = 200, description = "Least loaded node", body = BestNodeResponse),
        (status = 404, description = "No live node")
    )
)]
pub async fn best_node(
    State(state): State<SharedState>,
) -> Result<Json<BestNodeResponse>, AppError> {
    Ok(Json(monitor_service::best_node(&state).await?))
}

/// Record a task assignment.
#[utoipa::path(
    post,
    path = "/tasks",
    tag = "monitor",
    request_body = AssignTaskRequest,
    responses(
        (status = 201, description = "Task recorded", body = TaskView),
        (status = 409, description = "Task id already used")
    )
)]
pub async fn assign_task(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AssignTaskRequest>>,
) -> Result<(StatusCode, Json<TaskView>), AppError> {
    let task = monitor_service::assign_task(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// List open tasks keyed by node, orphans under `unassigned`.
#[utoipa::path(
    get,
    path = "/tasks",
    tag = "monitor",
    params(TasksQuery),
    responses((status = 200, description = "Open tasks per bucket", body = TaskBuckets))
)]
pub async fn list_tasks(
    State(state): State<SharedState>,
    Query(query): Query<TasksQuery>,
) -> Json<TaskBuckets> {
    Json(monitor_service::list_tasks(&state, query.node_id.as_deref()).await)
}

/// Fetch one task, completed ones included.
#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = "monitor",
    params(("task_id" = String, Path, description = "Identifier of the task")),
    responses(
        (status = 200, description = "Task", body = TaskView),
        (status = 404, description = "Unknown task")
    )
)]
pub async fn get_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, AppError> {
    Ok(Json(monitor_service::get_task(&state, &task_id).await?))
}

/// Mark a task as running.
#[utoipa::path(
    post,
    path = "/tasks/{task_id}/start",
    tag = "monitor",
    params(("task_id" = String, Path, description = "Identifier of the task")),
    responses(
        (status = 200, description = "Task running", body = TaskView),
        (status = 404, description = "Unknown task"),
        (status = 409, description = "Task already completed")
    )
)]
pub async fn start_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, AppError> {
    Ok(Json(monitor_service::start_task(&state, &task_id).await?))
}

/// Complete a task and append its result.
#[utoipa::path(
    post,
    path = "/tasks/{task_id}/complete",
    tag = "monitor",
    params(("task_id" = String, Path, description = "Identifier of the task")),
    responses(
        (status = 200, description = "Result created", body = ResultView),
        (status = 404, description = "Unknown task"),
        (status = 409, description = "Task already completed")
    )
)]
pub async fn complete_task(
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
) -> Result<Json<ResultView>, AppError> {
    Ok(Json(monitor_service::complete_task(&state, &task_id).await?))
}

/// List results per node in the requested order.
#[utoipa::path(
    get,
    path = "/results",
    tag = "monitor",
    params(ResultsQuery),
    responses((status = 200, description = "Results per node", body = ResultBuckets))
)]
pub async fn list_results(
    State(state): State<SharedState>,
    Query(query): Query<ResultsQuery>,
) -> Json<ResultBuckets> {
    Json(monitor_service::list_results(&state, query.order.into()).await)
}

/// Latest published monitoring snapshot.
#[utoipa::path(
    get,
    path = "/snapshot",
    tag = "monitor",
    responses((status = 200, description = "Latest snapshot", body = MonitorFrame))
)]
pub async fn snapshot(State(state): State<SharedState>) -> Result<Json<MonitorFrame>, AppError> {
    Ok(Json(monitor_service::latest_frame(&state)?))
}
