use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{
        format_timestamp,
        validation::{validate_node_id, validate_task_id},
    },
    state::{
        hub::Versioned,
        ledger::{Task, TaskStatus},
        monitor::Snapshot,
        registry::{Node, NodeId, NodeStats},
        results::{NodeTiming, ResultOrder, TaskResult, group_by_node},
    },
};

/// Resource report pushed by a node agent.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct HeartbeatRequest {
    /// CPU usage in percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub cpu: f64,
    /// RAM usage in percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub ram: f64,
    /// Disk usage in percent.
    #[validate(range(min = 0.0, max = 100.0))]
    pub disk: f64,
    /// Number of tasks the node is currently running.
    #[serde(default)]
    pub tasks: u32,
}

impl From<HeartbeatRequest> for NodeStats {
    fn from(value: HeartbeatRequest) -> Self {
        Self {
            cpu_pct: value.cpu,
            ram_pct: value.ram,
            disk_pct: value.disk,
            active_tasks: value.tasks,
        }
    }
}

/// Task assignment reported by a producer.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AssignTaskRequest {
    /// Producer-chosen unique identifier.
    #[validate(custom(function = "validate_task_id"))]
    pub task_id: String,
    /// Node the task is assigned to; it does not need to be registered yet.
    #[validate(custom(function = "validate_node_id"))]
    pub node_id: String,
    /// Opaque payload, typically a file path.
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
/// Load classification of a live node.
pub enum NodeStatusDto {
    /// CPU and RAM under the overload threshold.
    Available,
    /// CPU or RAM above the overload threshold.
    Overloaded,
    /// Evicted after missing heartbeats; stats are the last reported ones.
    Offline,
}

/// Live node as exposed to subscribers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NodeView {
    /// CPU usage in percent.
    pub cpu: f64,
    /// RAM usage in percent.
    pub ram: f64,
    /// Disk usage in percent.
    pub disk: f64,
    /// Tasks the node reports as running.
    pub tasks: u32,
    /// Load classification.
    pub status: NodeStatusDto,
    /// RFC 3339 time of the last heartbeat.
    pub last_heartbeat: String,
    /// Duration in seconds of the node's latest result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_time: Option<f64>,
    /// Mean duration in seconds over the node's results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_time: Option<f64>,
}

impl NodeView {
    fn live(node: &Node, threshold_pct: f64, timing: Option<&NodeTiming>) -> Self {
        let status = if node.is_overloaded(threshold_pct) {
            NodeStatusDto::Overloaded
        } else {
            NodeStatusDto::Available
        };
        Self::new(node, status, timing)
    }

    fn new(node: &Node, status: NodeStatusDto, timing: Option<&NodeTiming>) -> Self {
        Self {
            cpu: node.stats.cpu_pct,
            ram: node.stats.ram_pct,
            disk: node.stats.disk_pct,
            tasks: node.stats.active_tasks,
            status,
            last_heartbeat: format_timestamp(node.last_heartbeat),
            last_time: timing.map(|timing| timing.last_seconds),
            avg_time: timing.map(|timing| timing.avg_seconds),
        }
    }
}

/// Least loaded live node.
#[derive(Debug, Serialize, ToSchema)]
pub struct BestNodeResponse {
    /// Node identifier.
    pub id: String,
    /// `(cpu + ram) / 2 + tasks * 10`.
    pub load_score: f64,
    /// Current view of the node.
    #[serde(flatten)]
    pub view: NodeView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
/// Lifecycle status of a task.
pub enum TaskStatusDto {
    /// Assigned, not started.
    Pending,
    /// Picked up by its node.
    Running,
    /// Finished.
    Completed,
}

impl From<TaskStatus> for TaskStatusDto {
    fn from(value: TaskStatus) -> Self {
        match value {
            TaskStatus::Pending => TaskStatusDto::Pending,
            TaskStatus::Running => TaskStatusDto::Running,
            TaskStatus::Completed => TaskStatusDto::Completed,
        }
    }
}

/// Task payload pushed to subscribers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskView {
    /// Task identifier.
    pub task_id: String,
    /// Node the task was assigned to.
    pub node_id: String,
    /// Opaque payload.
    pub path: String,
    /// Lifecycle status.
    pub status: TaskStatusDto,
    /// RFC 3339 assignment time.
    pub assigned_at: String,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            node_id: task.node_id.clone(),
            path: task.path.clone(),
            status: task.status.into(),
            assigned_at: format_timestamp(task.assigned_at),
        }
    }
}

/// Result payload pushed to subscribers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultView {
    /// Log identifier, strictly increasing.
    pub id: u64,
    /// Task the result belongs to.
    pub task_id: String,
    /// Node the task ran on.
    pub node_id: String,
    /// Opaque payload of the task.
    pub path: String,
    /// Seconds between assignment and completion.
    pub duration_seconds: f64,
    /// RFC 3339 completion time.
    pub completed_at: String,
}

impl From<&TaskResult> for ResultView {
    fn from(result: &TaskResult) -> Self {
        Self {
            id: result.id,
            task_id: result.task_id.clone(),
            node_id: result.node_id.clone(),
            path: result.path.clone(),
            duration_seconds: result.duration_seconds,
            completed_at: format_timestamp(result.completed_at),
        }
    }
}

/// Full monitoring state pushed on every change and on subscription.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonitorFrame {
    /// Snapshot version; never decreases for a given subscriber.
    pub version: u64,
    /// Live nodes keyed by id.
    pub nodes: IndexMap<String, NodeView>,
    /// Open tasks keyed by node id, with orphans under `unassigned`.
    pub tasks: IndexMap<String, Vec<TaskView>>,
    /// Results keyed by node id, each list in log order.
    pub results: IndexMap<String, Vec<ResultView>>,
}

impl MonitorFrame {
    /// Render a published snapshot.
    pub fn new(version: u64, snapshot: &Snapshot) -> Self {
        Self {
            version,
            nodes: node_views(
                &snapshot.nodes,
                snapshot.overload_threshold_pct,
                &snapshot.timings,
            ),
            tasks: task_buckets(&snapshot.tasks_by_node),
            results: result_buckets(&snapshot.results),
        }
    }
}

/// Nodes keyed by id, as in the `nodes` field of a [`MonitorFrame`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(transparent)]
pub struct NodeMap(pub IndexMap<String, NodeView>);

/// Open tasks keyed by bucket, as in the `tasks` field of a [`MonitorFrame`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(transparent)]
pub struct TaskBuckets(pub IndexMap<String, Vec<TaskView>>);

/// Results keyed by node id, as in the `results` field of a [`MonitorFrame`].
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ResultBuckets(pub IndexMap<String, Vec<ResultView>>);

/// Render live nodes keyed by id.
pub fn node_views(
    nodes: &IndexMap<NodeId, Node>,
    threshold_pct: f64,
    timings: &HashMap<NodeId, NodeTiming>,
) -> IndexMap<String, NodeView> {
    nodes
        .iter()
        .map(|(id, node)| {
            (
                id.clone(),
                NodeView::live(node, threshold_pct, timings.get(id)),
            )
        })
        .collect()
}

/// Render evicted nodes keyed by id, all flagged offline.
pub fn offline_node_views(
    nodes: &IndexMap<NodeId, Node>,
    timings: &HashMap<NodeId, NodeTiming>,
) -> IndexMap<String, NodeView> {
    nodes
        .iter()
        .map(|(id, node)| {
            (
                id.clone(),
                NodeView::new(node, NodeStatusDto::Offline, timings.get(id)),
            )
        })
        .collect()
}

/// Render task buckets, keeping bucket and task order.
pub fn task_buckets(tasks: &IndexMap<NodeId, Vec<Task>>) -> IndexMap<String, Vec<TaskView>> {
    tasks
        .iter()
        .map(|(id, tasks)| (id.clone(), tasks.iter().map(TaskView::from).collect()))
        .collect()
}

/// Group results per node. Order inside each bucket follows `results`.
pub fn result_buckets(results: &[TaskResult]) -> IndexMap<String, Vec<ResultView>> {
    group_by_node(results)
        .into_iter()
        .map(|(id, results)| (id, results.iter().map(ResultView::from).collect()))
        .collect()
}

impl From<&Versioned<Snapshot>> for MonitorFrame {
    fn from(frame: &Versioned<Snapshot>) -> Self {
        Self::new(frame.version, &frame.payload)
    }
}

/// Build the best-node response.
pub fn best_node_response(
    node: &Node,
    threshold_pct: f64,
    timing: Option<&NodeTiming>,
) -> BestNodeResponse {
    BestNodeResponse {
        id: node.id.clone(),
        load_score: node.load_score(),
        view: NodeView::live(node, threshold_pct, timing),
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Sort order of `GET /results`.
pub enum ResultOrderParam {
    /// Node id ascending, numeric-aware.
    #[default]
    Node,
    /// Shortest duration first.
    TimeAsc,
    /// Longest duration first.
    TimeDesc,
}

impl From<ResultOrderParam> for ResultOrder {
    fn from(value: ResultOrderParam) -> Self {
        match value {
            ResultOrderParam::Node => ResultOrder::NodeIdAsc,
            ResultOrderParam::TimeAsc => ResultOrder::DurationAsc,
            ResultOrderParam::TimeDesc => ResultOrder::DurationDesc,
        }
    }
}

/// Query string of `GET /results`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResultsQuery {
    /// `node` (default), `time_asc` or `time_desc`.
    #[serde(default)]
    pub order: ResultOrderParam,
}

/// Query string of `GET /tasks`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TasksQuery {
    /// Restrict the listing to one bucket: a node id or `unassigned`.
    #[serde(default)]
    pub node_id: Option<String>,
}
