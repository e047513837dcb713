use std::collections::HashMap;

use indexmap::IndexMap;
use thiserror::Error;
use time::OffsetDateTime;

use crate::state::registry::NodeId;

/// Identifier supplied by the task producer.
pub type TaskId = String;

/// Lifecycle of a task. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Assigned to a node but not picked up yet.
    Pending,
    /// Picked up by the node.
    Running,
    /// Finished; a result has been recorded.
    Completed,
}

/// A unit of work tracked from assignment to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,
    /// Node the task was assigned to (may not be registered).
    pub node_id: NodeId,
    /// Opaque payload, typically a file path.
    pub path: String,
    /// Current status.
    pub status: TaskStatus,
    /// When the assignment was reported.
    pub assigned_at: OffsetDateTime,
    /// When the task was completed, if it was.
    pub completed_at: Option<OffsetDateTime>,
}

/// Outcome of a completion, ready to be appended to the result log.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTask {
    /// Task that completed.
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

/// Rejections raised by the task ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A task with this id was already assigned.
    #[error("task `{0}` already exists")]
    AlreadyExists(TaskId),
    /// No task with this id is known.
    #[error("task `{0}` not found")]
    NotFound(TaskId),
    /// The task was already completed.
    #[error("task `{0}` already completed")]
    AlreadyCompleted(TaskId),
}

/// Assignment and completion records. Open tasks are also indexed per node in
/// assignment order; completed ones only stay in the history.
#[derive(Debug, Default)]
pub struct TaskLedger {
    tasks: HashMap<TaskId, Task>,
    open_ids: IndexMap<NodeId, Vec<TaskId>>,
}

impl TaskLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new pending task. Duplicate ids are rejected and the original kept.
    pub fn assign(
        &mut self,
        task_id: &str,
        node_id: &str,
        path: &str,
        now: OffsetDateTime,
    ) -> Result<Task, LedgerError> {
        if self.tasks.contains_key(task_id) {
            return Err(LedgerError::AlreadyExists(task_id.to_string()));
        }

        let task = Task {
            id: task_id.to_string(),
            node_id: node_id.to_string(),
            path: path.to_string(),
            status: TaskStatus::Pending,
            assigned_at: now,
            completed_at: None,
        };
        self.tasks.insert(task.id.clone(), task.clone());
        self.open_ids
            .entry(task.node_id.clone())
            .or_default()
            .push(task.id.clone());
        Ok(task)
    }

    /// Mark a pending task as running. Starting a running task is a no-op.
    pub fn start(&mut self, task_id: &str) -> Result<Task, LedgerError> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| LedgerError::NotFound(task_id.to_string()))?;

        match task.status {
            TaskStatus::Completed => Err(LedgerError::AlreadyCompleted(task_id.to_string())),
            TaskStatus::Pending | TaskStatus::Running => {
                task.status = TaskStatus::Running;
                Ok(task.clone())
            }
        }
    }

    /// Complete a task exactly once, returning the data for its result.
    pub fn complete(
        &mut self,
        task_id: &str,
        now: OffsetDateTime,
    ) -> Result<CompletedTask, LedgerError> {
        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| LedgerError::NotFound(task_id.to_string()))?;

        if task.status == TaskStatus::Completed {
            return Err(LedgerError::AlreadyCompleted(task_id.to_string()));
        }

        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        let completed = CompletedTask {
            task_id: task.id.clone(),
            node_id: task.node_id.clone(),
            path: task.path.clone(),
            duration_seconds: (now - task.assigned_at).as_seconds_f64().max(0.0),
            completed_at: now,
        };

        if let Some(ids) = self.open_ids.get_mut(&completed.node_id) {
            ids.retain(|id| id != task_id);
            if ids.is_empty() {
                self.open_ids.shift_remove(&completed.node_id);
            }
        }
        Ok(completed)
    }

    /// Look up any task, completed or not.
    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    /// Non-completed tasks of `node_id` in assignment order.
    pub fn tasks_for(&self, node_id: &str) -> Vec<Task> {
        self.open_ids
            .get(node_id)
            .map(|ids| self.resolve(ids))
            .unwrap_or_default()
    }

    /// Non-completed tasks grouped by node id; nodes without open tasks are omitted.
    pub fn open_by_node(&self) -> IndexMap<NodeId, Vec<Task>> {
        self.open_ids
            .iter()
            .map(|(node_id, ids)| (node_id.clone(), self.resolve(ids)))
            .collect()
    }

    fn resolve(&self, ids: &[TaskId]) -> Vec<Task> {
        ids.iter()
            .filter_map(|id| self.tasks.get(id))
            .cloned()
            .collect()
    }
}
