//! Authoritative monitoring state: node registry, task ledger and result log.

use std::{collections::HashMap, time::Duration as StdDuration};

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::state::{
    ledger::{LedgerError, Task, TaskLedger},
    registry::{Node, NodeId, NodeRegistry, NodeStats},
    results::{NodeTiming, ResultLog, ResultOrder, TaskResult},
};

/// Bucket under which tasks of unregistered nodes are surfaced.
pub const UNASSIGNED_BUCKET: &str = "unassigned";

/// Immutable point-in-time view of the monitoring state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Live nodes keyed by id.
    pub nodes: IndexMap<NodeId, Node>,
    /// Open tasks per live node; tasks of unknown nodes sit under [`UNASSIGNED_BUCKET`].
    pub tasks_by_node: IndexMap<NodeId, Vec<Task>>,
    /// Result log in id order.
    pub results: Vec<TaskResult>,
    /// Timing summaries per node, including evicted ones.
    pub timings: HashMap<NodeId, NodeTiming>,
    /// Threshold used to flag overloaded nodes.
    pub overload_threshold_pct: f64,
}

/// Single writer for nodes, tasks and results.
#[derive(Debug)]
pub struct Monitor {
    registry: NodeRegistry,
    ledger: TaskLedger,
    results: ResultLog,
    overload_threshold_pct: f64,
}

impl Monitor {
    /// Create an empty monitor flagging nodes above `overload_threshold_pct`.
    pub fn new(overload_threshold_pct: f64) -> Self {
        Self {
            registry: NodeRegistry::new(),
            ledger: TaskLedger::new(),
            results: ResultLog::new(),
            overload_threshold_pct,
        }
    }

    /// Apply a node heartbeat. Returns `true` when the node (re)joined the live set.
    pub fn heartbeat(&mut self, node_id: &str, stats: NodeStats, now: OffsetDateTime) -> bool {
        self.registry.upsert(node_id, stats, now)
    }

    /// Evict nodes whose heartbeat is older than `timeout`.
    pub fn sweep_stale(&mut self, now: OffsetDateTime, timeout: StdDuration) -> Vec<Node> {
        self.registry.sweep_stale(now, timeout)
    }

    /// Record a task assignment; the node does not have to be registered.
    pub fn assign_task(
        &mut self,
        task_id: &str,
        node_id: &str,
        path: &str,
        now: OffsetDateTime,
    ) -> Result<Task, LedgerError> {
        self.ledger.assign(task_id, node_id, path, now)
    }

    /// Mark a task as running.
    pub fn start_task(&mut self, task_id: &str) -> Result<Task, LedgerError> {
        self.ledger.start(task_id)
    }

    /// Complete a task and append its result.
    pub fn complete_task(
        &mut self,
        task_id: &str,
        now: OffsetDateTime,
    ) -> Result<TaskResult, LedgerError> {
        let completed = self.ledger.complete(task_id, now)?;
        Ok(self.results.record(completed))
    }

    /// Live nodes.
    pub fn nodes(&self) -> Vec<Node> {
        self.registry.list()
    }

    /// Last known state of evicted nodes.
    pub fn evicted_nodes(&self) -> IndexMap<NodeId, Node> {
        self.registry.evicted().clone()
    }

    /// Least loaded live node.
    pub fn best_node(&self) -> Option<Node> {
        self.registry.best_node().cloned()
    }

    /// Any task by id, completed ones included.
    pub fn task(&self, task_id: &str) -> Result<Task, LedgerError> {
        self.ledger
            .get(task_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(task_id.to_string()))
    }

    /// Open tasks keyed by bucket, optionally restricted to one bucket.
    ///
    /// Without a filter the buckets match [`Snapshot::tasks_by_node`]. The
    /// [`UNASSIGNED_BUCKET`] filter selects the orphans; any other id selects the
    /// open tasks assigned to that node, whether it is live or not.
    pub fn open_tasks(&self, bucket: Option<&str>) -> IndexMap<NodeId, Vec<Task>> {
        match bucket {
            None => self.bucketed_tasks(),
            Some(UNASSIGNED_BUCKET) => self
                .bucketed_tasks()
                .shift_remove_entry(UNASSIGNED_BUCKET)
                .into_iter()
                .collect(),
            Some(node_id) => {
                let tasks = self.ledger.tasks_for(node_id);
                if tasks.is_empty() {
                    IndexMap::new()
                } else {
                    IndexMap::from([(node_id.to_string(), tasks)])
                }
            }
        }
    }

    /// Sorted copy of the result log.
    pub fn ordered_results(&self, by: ResultOrder) -> Vec<TaskResult> {
        self.results.ordered(by)
    }

    /// Timing summaries of every node that produced results.
    pub fn timings(&self) -> HashMap<NodeId, NodeTiming> {
        self.results.timings()
    }

    /// Timing summary of one node's results.
    pub fn node_timing(&self, node_id: &str) -> Option<NodeTiming> {
        self.results.timings().remove(node_id)
    }

    /// Threshold used to flag overloaded nodes.
    pub fn overload_threshold_pct(&self) -> f64 {
        self.overload_threshold_pct
    }

    /// Build a complete snapshot of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.registry.live().clone(),
            tasks_by_node: self.bucketed_tasks(),
            results: self.results.entries().to_vec(),
            timings: self.results.timings(),
            overload_threshold_pct: self.overload_threshold_pct,
        }
    }

    fn bucketed_tasks(&self) -> IndexMap<NodeId, Vec<Task>> {
        let mut tasks_by_node: IndexMap<NodeId, Vec<Task>> = IndexMap::new();
        let mut orphans = Vec::new();
        for (node_id, tasks) in self.ledger.open_by_node() {
            if self.registry.contains(&node_id) {
                tasks_by_node.insert(node_id, tasks);
            } else {
                orphans.extend(tasks);
            }
        }
        if !orphans.is_empty() {
            orphans.sort_by(|a, b| a.assigned_at.cmp(&b.assigned_at));
            tasks_by_node.insert(UNASSIGNED_BUCKET.to_string(), orphans);
        }
        tasks_by_node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn at(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(seconds)
    }

    fn stats() -> NodeStats {
        NodeStats {
            cpu_pct: 10.0,
            ram_pct: 10.0,
            disk_pct: 10.0,
            active_tasks: 0,
        }
    }

    #[test]
    fn orphan_tasks_land_in_unassigned_bucket() {
        let mut monitor = Monitor::new(80.0);
        monitor.heartbeat("node1", stats(), at(0));
        monitor.assign_task("t1", "node1", "a", at(0)).unwrap();
        monitor.assign_task("t2", "ghost", "b", at(1)).unwrap();

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.tasks_by_node["node1"][0].id, "t1");
        assert_eq!(snapshot.tasks_by_node[UNASSIGNED_BUCKET][0].id, "t2");
        assert!(!snapshot.tasks_by_node.contains_key("ghost"));
    }

    #[test]
    fn orphan_tasks_move_once_node_registers() {
        let mut monitor = Monitor::new(80.0);
        monitor.assign_task("t1", "node5", "a", at(0)).unwrap();
        monitor.heartbeat("node5", stats(), at(1));

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.tasks_by_node["node5"].len(), 1);
        assert!(!snapshot.tasks_by_node.contains_key(UNASSIGNED_BUCKET));
    }

    #[test]
    fn open_tasks_resolve_buckets() {
        let mut monitor = Monitor::new(80.0);
        monitor.heartbeat("node1", stats(), at(0));
        monitor.assign_task("t1", "node1", "a", at(0)).unwrap();
        monitor.assign_task("t2", "ghost", "b", at(1)).unwrap();

        let all = monitor.open_tasks(None);
        assert_eq!(all, monitor.snapshot().tasks_by_node);

        let orphans = monitor.open_tasks(Some(UNASSIGNED_BUCKET));
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[UNASSIGNED_BUCKET][0].id, "t2");

        assert_eq!(monitor.open_tasks(Some("ghost"))["ghost"][0].id, "t2");
        assert!(monitor.open_tasks(Some("node9")).is_empty());
    }

    #[test]
    fn completed_task_stays_queryable() {
        let mut monitor = Monitor::new(80.0);
        monitor.assign_task("t1", "n1", "a", at(0)).unwrap();
        monitor.complete_task("t1", at(1)).unwrap();

        assert_eq!(monitor.task("t1").unwrap().completed_at, Some(at(1)));
        assert_eq!(
            monitor.task("t9"),
            Err(LedgerError::NotFound("t9".to_string()))
        );
    }

    #[test]
    fn evicted_node_keeps_its_results() {
        let mut monitor = Monitor::new(80.0);
        monitor.heartbeat("n1", stats(), at(0));
        monitor.assign_task("t1", "n1", "a", at(0)).unwrap();
        monitor.complete_task("t1", at(2)).unwrap();

        let evicted = monitor.sweep_stale(at(8), StdDuration::from_secs(5));
        assert_eq!(evicted.len(), 1);

        let snapshot = monitor.snapshot();
        assert!(snapshot.nodes.is_empty());
        assert!(monitor.evicted_nodes().contains_key("n1"));
        assert_eq!(snapshot.results.len(), 1);
        assert_eq!(snapshot.results[0].node_id, "n1");
        assert!(snapshot.timings.contains_key("n1"));
    }

    #[test]
    fn failed_completion_creates_no_result() {
        let mut monitor = Monitor::new(80.0);
        assert!(monitor.complete_task("nope", at(0)).is_err());
        monitor.assign_task("t1", "n1", "a", at(0)).unwrap();
        monitor.complete_task("t1", at(1)).unwrap();
        assert!(monitor.complete_task("t1", at(2)).is_err());
        assert_eq!(monitor.snapshot().results.len(), 1);
    }
}
