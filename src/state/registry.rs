use std::{cmp::Ordering, time::Duration as StdDuration};

use indexmap::IndexMap;
use time::{Duration, OffsetDateTime};

/// Identifier reported by a worker node.
pub type NodeId = String;

/// Weight applied to each active task when ranking nodes by load.
const TASK_LOAD_WEIGHT: f64 = 10.0;

/// Resource usage reported by a node heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeStats {
    /// CPU usage in percent (0–100).
    pub cpu_pct: f64,
    /// RAM usage in percent (0–100).
    pub ram_pct: f64,
    /// Disk usage in percent (0–100).
    pub disk_pct: f64,
    /// Number of tasks the node reports as active.
    pub active_tasks: u32,
}

/// Last known state of a worker node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Most recent resource stats.
    pub stats: NodeStats,
    /// Time of the most recent heartbeat.
    pub last_heartbeat: OffsetDateTime,
}

impl Node {
    /// Load score used for placement: average of cpu and ram plus a per-task penalty.
    pub fn load_score(&self) -> f64 {
        (self.stats.cpu_pct + self.stats.ram_pct) / 2.0
            + f64::from(self.stats.active_tasks) * TASK_LOAD_WEIGHT
    }

    /// Whether cpu or ram usage is above `threshold_pct`.
    pub fn is_overloaded(&self, threshold_pct: f64) -> bool {
        self.stats.cpu_pct > threshold_pct || self.stats.ram_pct > threshold_pct
    }
}

/// Live set of nodes plus the last known state of evicted ones.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    live: IndexMap<NodeId, Node>,
    evicted: IndexMap<NodeId, Node>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat, creating or overwriting the node's stats.
    ///
    /// Returns `true` when the node joined (or re-joined) the live set.
    pub fn upsert(&mut self, id: &str, stats: NodeStats, now: OffsetDateTime) -> bool {
        if let Some(node) = self.live.get_mut(id) {
            node.stats = stats;
            node.last_heartbeat = now;
            return false;
        }

        self.evicted.shift_remove(id);
        self.live.insert(
            id.to_string(),
            Node {
                id: id.to_string(),
                stats,
                last_heartbeat: now,
            },
        );
        true
    }

    /// Move every node whose last heartbeat is older than `timeout` out of the live set.
    pub fn sweep_stale(&mut self, now: OffsetDateTime, timeout: StdDuration) -> Vec<Node> {
        let timeout = Duration::try_from(timeout).unwrap_or(Duration::MAX);
        let stale: Vec<NodeId> = self
            .live
            .values()
            .filter(|node| now - node.last_heartbeat > timeout)
            .map(|node| node.id.clone())
            .collect();

        stale
            .into_iter()
            .filter_map(|id| self.live.shift_remove(&id))
            .inspect(|node| {
                self.evicted.insert(node.id.clone(), node.clone());
            })
            .collect()
    }

    /// Point-in-time copy of all live nodes, in first-seen order.
    pub fn list(&self) -> Vec<Node> {
        self.live.values().cloned().collect()
    }

    /// Borrow the live nodes keyed by id.
    pub fn live(&self) -> &IndexMap<NodeId, Node> {
        &self.live
    }

    /// Whether `id` is currently live.
    pub fn contains(&self, id: &str) -> bool {
        self.live.contains_key(id)
    }

    /// Last known state of nodes that stopped heartbeating, in eviction order.
    pub fn evicted(&self) -> &IndexMap<NodeId, Node> {
        &self.evicted
    }

    /// Least loaded live node; ties go to the lowest id.
    pub fn best_node(&self) -> Option<&Node> {
        self.live.values().min_by(|a, b| {
            a.load_score()
                .total_cmp(&b.load_score())
                .then_with(|| compare_node_ids(&a.id, &b.id))
        })
    }
}

/// Compare node ids treating a trailing run of digits as a number, so `node2 < node10`.
pub fn compare_node_ids(a: &str, b: &str) -> Ordering {
    let (a_prefix, a_digits) = split_trailing_digits(a);
    let (b_prefix, b_digits) = split_trailing_digits(b);

    a_prefix
        .cmp(b_prefix)
        .then_with(|| compare_digit_runs(a_digits, b_digits))
        .then_with(|| a.cmp(b))
}

fn split_trailing_digits(id: &str) -> (&str, &str) {
    let prefix_len = id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    id.split_at(prefix_len)
}

/// Numeric comparison of two digit strings of arbitrary length.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
