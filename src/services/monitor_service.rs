use time::OffsetDateTime;
use tracing::info;

use crate::{
    dto::{
        monitor::{
            AssignTaskRequest, BestNodeResponse, HeartbeatRequest, MonitorFrame, NodeMap,
            ResultBuckets, ResultView, TaskBuckets, TaskView, best_node_response, node_views,
            offline_node_views, result_buckets, task_buckets,
        },
        validation::validate_node_id,
    },
    error::ServiceError,
    state::{SharedState, results::ResultOrder},
};

/// Apply a node heartbeat and publish the resulting snapshot.
pub async fn heartbeat(
    state: &SharedState,
    node_id: &str,
    request: HeartbeatRequest,
) -> Result<(), ServiceError> {
    validate_node_id(node_id).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let now = OffsetDateTime::now_utc();
    let joined = state
        .update_monitor(|monitor| {
            Ok::<_, ServiceError>(monitor.heartbeat(node_id, request.into(), now))
        })
        .await?;
    if joined {
        info!(node_id, "node joined the live set");
    }
    Ok(())
}

/// Record a task assignment. Unknown nodes are accepted.
pub async fn assign_task(
    state: &SharedState,
    request: AssignTaskRequest,
) -> Result<TaskView, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let task = state
        .update_monitor(|monitor| {
            monitor.assign_task(&request.task_id, &request.node_id, &request.path, now)
        })
        .await?;
    Ok(TaskView::from(&task))
}

/// Mark a task as running.
pub async fn start_task(state: &SharedState, task_id: &str) -> Result<TaskView, ServiceError> {
    let task = state
        .update_monitor(|monitor| monitor.start_task(task_id))
        .await?;
    Ok(TaskView::from(&task))
}

/// Complete a task and return the result it produced.
pub async fn complete_task(state: &SharedState, task_id: &str) -> Result<ResultView, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let result = state
        .update_monitor(|monitor| monitor.complete_task(task_id, now))
        .await?;
    info!(
        task_id,
        node_id = %result.node_id,
        duration_seconds = result.duration_seconds,
        "task completed"
    );
    Ok(ResultView::from(&result))
}

/// Live nodes keyed by id, shaped like the `nodes` field of a frame.
pub async fn list_nodes(state: &SharedState) -> NodeMap {
    let nodes = state
        .read_monitor(|monitor| {
            let snapshot = monitor.snapshot();
            node_views(
                &snapshot.nodes,
                snapshot.overload_threshold_pct,
                &snapshot.timings,
            )
        })
        .await;
    NodeMap(nodes)
}

/// Nodes evicted for missing heartbeats, with their last reported stats.
pub async fn list_evicted_nodes(state: &SharedState) -> NodeMap {
    let nodes = state
        .read_monitor(|monitor| {
            offline_node_views(&monitor.evicted_nodes(), &monitor.timings())
        })
        .await;
    NodeMap(nodes)
}

/// Open tasks keyed by bucket, shaped like the `tasks` field of a frame.
pub async fn list_tasks(state: &SharedState, bucket: Option<&str>) -> TaskBuckets {
    let tasks = state.read_monitor(|monitor| monitor.open_tasks(bucket)).await;
    TaskBuckets(task_buckets(&tasks))
}

/// Any task by id, completed ones included.
pub async fn get_task(state: &SharedState, task_id: &str) -> Result<TaskView, ServiceError> {
    let task = state.read_monitor(|monitor| monitor.task(task_id)).await?;
    Ok(TaskView::from(&task))
}

/// Results keyed by node id; buckets and their entries follow `order`.
pub async fn list_results(state: &SharedState, order: ResultOrder) -> ResultBuckets {
    let results = state
        .read_monitor(|monitor| monitor.ordered_results(order))
        .await;
    ResultBuckets(result_buckets(&results))
}

/// Latest published monitoring frame.
pub fn latest_frame(state: &SharedState) -> Result<MonitorFrame, ServiceError> {
    state
        .monitor_hub()
        .latest()
        .map(|frame| MonitorFrame::from(&frame))
        .ok_or_else(|| ServiceError::Unavailable("no snapshot published yet".into()))
}

/// Least loaded live node.
pub async fn best_node(state: &SharedState) -> Result<BestNodeResponse, ServiceError> {
    state
        .read_monitor(|monitor| {
            let node = monitor.best_node()?;
            let timing = monitor.node_timing(&node.id);
            Some(best_node_response(
                &node,
                monitor.overload_threshold_pct(),
                timing.as_ref(),
            ))
        })
        .await
        .ok_or_else(|| ServiceError::NotFound("no live node".into()))
}
