use std::collections::HashMap;

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::state::{
    ledger::{CompletedTask, TaskId},
    registry::{NodeId, compare_node_ids},
};

/// Identifier assigned to a result, strictly increasing in log order.
pub type ResultId = u64;

/// Immutable record of a completed task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    /// Log position identifier.
    pub id: ResultId,
    /// Task this result belongs to.
    pub task_id: TaskId,
    /// Node the task ran on.
    pub node_id: NodeId,
    /// Payload of the task.
    pub path: String,
    /// Seconds between assignment and completion.
    pub duration_seconds: f64,
    /// Completion time.
    pub completed_at: OffsetDateTime,
}

/// Sort orders offered over the result log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultOrder {
    /// Node id ascending (numeric-aware), then id.
    #[default]
    NodeIdAsc,
    /// Shortest duration first, then id.
    DurationAsc,
    /// Exact reverse of [`ResultOrder::DurationAsc`].
    DurationDesc,
}

/// Timing summary of the results produced by one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTiming {
    /// Duration of the most recent result.
    pub last_seconds: f64,
    /// Mean duration over all results.
    pub avg_seconds: f64,
    /// Number of results.
    pub count: usize,
}

/// Append-only log of task results.
#[derive(Debug, Default)]
pub struct ResultLog {
    entries: Vec<TaskResult>,
    last_id: ResultId,
}

impl ResultLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the result of a completed task under the next id.
    pub fn record(&mut self, completed: CompletedTask) -> TaskResult {
        self.last_id += 1;
        let result = TaskResult {
            id: self.last_id,
            task_id: completed.task_id,
            node_id: completed.node_id,
            path: completed.path,
            duration_seconds: completed.duration_seconds,
            completed_at: completed.completed_at,
        };
        self.entries.push(result.clone());
        result
    }

    /// Entries in log order.
    pub fn entries(&self) -> &[TaskResult] {
        &self.entries
    }

    /// Freshly sorted copy of the log.
    pub fn ordered(&self, by: ResultOrder) -> Vec<TaskResult> {
        order_results(&self.entries, by)
    }

    /// Timing summary per node.
    pub fn timings(&self) -> HashMap<NodeId, NodeTiming> {
        node_timings(&self.entries)
    }
}

/// Sort a slice of results. Entries are assumed to be in id order already.
pub fn order_results(entries: &[TaskResult], by: ResultOrder) -> Vec<TaskResult> {
    let mut sorted = entries.to_vec();
    match by {
        ResultOrder::NodeIdAsc => sorted.sort_by(|a, b| {
            compare_node_ids(&a.node_id, &b.node_id).then_with(|| a.id.cmp(&b.id))
        }),
        ResultOrder::DurationAsc => sorted.sort_by(|a, b| {
            a.duration_seconds
                .total_cmp(&b.duration_seconds)
                .then_with(|| a.id.cmp(&b.id))
        }),
        ResultOrder::DurationDesc => {
            sorted = order_results(entries, ResultOrder::DurationAsc);
            sorted.reverse();
        }
    }
    sorted
}

/// Group results per node, preserving log order inside each group.
pub fn group_by_node(entries: &[TaskResult]) -> IndexMap<NodeId, Vec<TaskResult>> {
    let mut grouped: IndexMap<NodeId, Vec<TaskResult>> = IndexMap::new();
    for result in entries {
        grouped
            .entry(result.node_id.clone())
            .or_default()
            .push(result.clone());
    }
    grouped
}

/// Compute per-node timing summaries.
pub fn node_timings(entries: &[TaskResult]) -> HashMap<NodeId, NodeTiming> {
    let mut totals: HashMap<NodeId, (f64, NodeTiming)> = HashMap::new();
    for result in entries {
        let (sum, timing) = totals.entry(result.node_id.clone()).or_insert((
            0.0,
            NodeTiming {
                last_seconds: 0.0,
                avg_seconds: 0.0,
                count: 0,
            },
        ));
        *sum += result.duration_seconds;
        timing.count += 1;
        timing.last_seconds = result.duration_seconds;
        timing.avg_seconds = *sum / timing.count as f64;
    }
    totals
        .into_iter()
        .map(|(node_id, (_, timing))| (node_id, timing))
        .collect()
}
