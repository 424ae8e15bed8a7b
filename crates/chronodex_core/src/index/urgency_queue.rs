//! Self-healing urgency queue.
//!
//! # Responsibility
//! - Order pending task references by a live urgency score (lower = more urgent).
//! - Rescore every resident node from the current time before each structural
//!   operation, so no background timer is needed.
//!
//! # Invariants
//! - `insert` and `extract_min` run a full refresh pass first.
//! - Every overdue task scores below every non-overdue task.
//! - None of the operations fail; missing input scores at the back.

use crate::clock::Clock;
use crate::model::task::{Priority, Task, TaskId};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

const MS_PER_HOUR: f64 = 3_600_000.0;
/// Hours after which urgency stops growing within a class.
pub const URGENCY_HORIZON_HOURS: f64 = 19.0;
/// Subtracted from the class weight for overdue tasks.
pub const OVERDUE_OFFSET: f64 = 100.0;
/// Added to the class weight when the deadline is unknown.
pub const MISSING_DEADLINE_PENALTY: f64 = 100.0;

fn class_weight(priority: Option<Priority>) -> f64 {
    match priority {
        Some(Priority::Critical) => 0.0,
        Some(Priority::High) => 10.0,
        Some(Priority::Medium) => 20.0,
        Some(Priority::Low) | None => 30.0,
    }
}

/// Computes the urgency score of a deadline/priority pair at `now_ms`.
///
/// - missing deadline: `weight + 100`
/// - overdue: `weight - 100`
/// - otherwise: `weight + min(hours_left, 19)`
pub fn urgency_score(deadline: Option<i64>, priority: Option<Priority>, now_ms: i64) -> f64 {
    let weight = class_weight(priority);
    let Some(deadline) = deadline else {
        return weight + MISSING_DEADLINE_PENALTY;
    };

    let hours = (i128::from(deadline) - i128::from(now_ms)) as f64 / MS_PER_HOUR;
    if hours < 0.0 {
        return weight - OVERDUE_OFFSET;
    }
    weight + hours.min(URGENCY_HORIZON_HOURS)
}

/// Lightweight queue projection of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueNode {
    pub task_id: TaskId,
    pub deadline: Option<i64>,
    pub priority: Option<Priority>,
    pub score: f64,
}

impl QueueNode {
    /// Builds a node with a score computed at `now_ms`.
    pub fn new(
        task_id: TaskId,
        deadline: Option<i64>,
        priority: Option<Priority>,
        now_ms: i64,
    ) -> Self {
        Self {
            task_id,
            deadline,
            priority,
            score: urgency_score(deadline, priority, now_ms),
        }
    }

    pub fn from_task(task: &Task, now_ms: i64) -> Self {
        Self::new(task.id, task.deadline, Some(task.priority), now_ms)
    }

    fn rescore(&mut self, now_ms: i64) {
        self.score = urgency_score(self.deadline, self.priority, now_ms);
    }
}

impl Eq for QueueNode {}

impl Ord for QueueNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties resolve by earlier deadline, then id, to keep ordering deterministic.
        self.score
            .total_cmp(&other.score)
            .then_with(|| {
                self.deadline
                    .unwrap_or(i64::MAX)
                    .cmp(&other.deadline.unwrap_or(i64::MAX))
            })
            .then_with(|| self.task_id.cmp(&other.task_id))
    }
}

impl PartialOrd for QueueNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue of task references keyed by live urgency.
pub struct UrgencyQueue {
    heap: BinaryHeap<Reverse<QueueNode>>,
    clock: Arc<dyn Clock>,
}

impl UrgencyQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            heap: BinaryHeap::new(),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.heap.iter().any(|Reverse(node)| node.task_id == task_id)
    }

    /// Recomputes every resident score from the current time and re-heapifies.
    pub fn refresh(&mut self) {
        let now_ms = self.clock.now_ms();
        let mut nodes = std::mem::take(&mut self.heap).into_vec();
        for Reverse(node) in &mut nodes {
            node.rescore(now_ms);
        }
        self.heap = BinaryHeap::from(nodes);
    }

    /// Inserts a node after a refresh pass. The node itself is scored at insert time.
    pub fn insert(&mut self, mut node: QueueNode) {
        self.refresh();
        node.rescore(self.clock.now_ms());
        self.heap.push(Reverse(node));
    }

    /// Removes and returns the most urgent node after a refresh pass.
    pub fn extract_min(&mut self) -> Option<QueueNode> {
        self.refresh();
        self.heap.pop().map(|Reverse(node)| node)
    }

    /// Returns the most urgent node as of the last refresh.
    pub fn peek(&self) -> Option<&QueueNode> {
        self.heap.peek().map(|Reverse(node)| node)
    }

    /// Replaces the queue content with `tasks`, scored now, in one O(n) heapify.
    pub fn build_heap<'a>(&mut self, tasks: impl IntoIterator<Item = &'a Task>) {
        let now_ms = self.clock.now_ms();
        let nodes = tasks
            .into_iter()
            .map(|task| Reverse(QueueNode::from_task(task, now_ms)))
            .collect::<Vec<_>>();
        self.heap = BinaryHeap::from(nodes);
    }

    /// Drops the node for `task_id`. Returns whether a node was removed.
    pub fn remove(&mut self, task_id: TaskId) -> bool {
        let before = self.heap.len();
        self.heap.retain(|Reverse(node)| node.task_id != task_id);
        self.heap.len() != before
    }

    /// Snapshot of all nodes in ascending score order; the queue is untouched.
    pub fn sorted_nodes(&self) -> Vec<QueueNode> {
        let mut nodes = self
            .heap
            .iter()
            .map(|Reverse(node)| node.clone())
            .collect::<Vec<_>>();
        nodes.sort();
        nodes
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{urgency_score, QueueNode, UrgencyQueue};
    use crate::clock::{Clock, ManualClock};
    use crate::model::task::{Priority, Task};
    use std::sync::Arc;
    use uuid::Uuid;

    const HOUR: i64 = 3_600_000;
    const NOW: i64 = 1_700_000_000_000;

    fn task(priority: Priority, deadline: Option<i64>) -> Task {
        let mut task = Task::new("queued", priority);
        task.deadline = deadline;
        task
    }

    #[test]
    fn score_follows_class_weights_and_horizon_cap() {
        assert_eq!(urgency_score(Some(NOW + 5 * HOUR), Some(Priority::Critical), NOW), 5.0);
        assert_eq!(urgency_score(Some(NOW + 2 * HOUR), Some(Priority::High), NOW), 12.0);
        assert_eq!(urgency_score(Some(NOW + 100 * HOUR), Some(Priority::Medium), NOW), 39.0);
        assert_eq!(urgency_score(Some(NOW), Some(Priority::Low), NOW), 30.0);
    }

    #[test]
    fn overdue_always_beats_upcoming() {
        let overdue_low = urgency_score(Some(NOW - 1), Some(Priority::Low), NOW);
        let upcoming_critical = urgency_score(Some(NOW + 19 * HOUR), Some(Priority::Critical), NOW);
        assert_eq!(overdue_low, -70.0);
        assert_eq!(upcoming_critical, 19.0);
        assert!(overdue_low < upcoming_critical);

        let overdue_critical = urgency_score(Some(NOW - HOUR), Some(Priority::Critical), NOW);
        assert!(overdue_critical < overdue_low);
    }

    #[test]
    fn missing_deadline_and_unknown_priority_go_to_the_back() {
        assert_eq!(urgency_score(None, Some(Priority::Critical), NOW), 100.0);
        assert_eq!(urgency_score(None, None, NOW), 130.0);
        assert_eq!(urgency_score(Some(NOW + HOUR), None, NOW), 31.0);
    }

    #[test]
    fn extreme_timestamps_score_without_overflow() {
        assert_eq!(urgency_score(Some(i64::MIN), Some(Priority::High), i64::MAX), -90.0);
        assert_eq!(urgency_score(Some(i64::MAX), Some(Priority::High), i64::MIN), 29.0);
    }

    #[test]
    fn build_heap_then_peek_returns_lowest_score() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mut queue = UrgencyQueue::new(clock);
        let tasks = vec![
            task(Priority::Low, Some(NOW + 3 * HOUR)),
            task(Priority::Critical, Some(NOW + 30 * HOUR)),
            task(Priority::High, Some(NOW + HOUR)),
            task(Priority::Medium, None),
        ];

        queue.build_heap(&tasks);

        assert_eq!(queue.len(), 4);
        let head = queue.peek().unwrap();
        assert_eq!(head.task_id, tasks[2].id);
        assert_eq!(head.score, 11.0);
    }

    #[test]
    fn extract_min_drains_in_ascending_score_order() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mut queue = UrgencyQueue::new(clock.clone());
        for (priority, hours) in [
            (Priority::Medium, 4),
            (Priority::Critical, 10),
            (Priority::Low, -2),
            (Priority::High, 1),
        ] {
            let task = task(priority, Some(NOW + hours * HOUR));
            queue.insert(QueueNode::from_task(&task, clock.now_ms()));
        }

        let scores = std::iter::from_fn(|| queue.extract_min())
            .map(|node| node.score)
            .collect::<Vec<_>>();
        assert_eq!(scores, vec![-70.0, 10.0, 11.0, 24.0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn refresh_reorders_when_time_passes() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mut queue = UrgencyQueue::new(clock.clone());
        let low_soon = task(Priority::Low, Some(NOW + HOUR));
        let critical_later = task(Priority::Critical, Some(NOW + 40 * HOUR));
        queue.build_heap([&low_soon, &critical_later]);
        assert_eq!(queue.peek().unwrap().task_id, critical_later.id);

        clock.advance_ms(2 * HOUR);
        let filler = task(Priority::Medium, None);
        queue.insert(QueueNode::from_task(&filler, clock.now_ms()));

        let head = queue.extract_min().unwrap();
        assert_eq!(head.task_id, low_soon.id);
        assert_eq!(head.score, -70.0);
    }

    #[test]
    fn insert_rescores_stale_node() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mut queue = UrgencyQueue::new(clock);
        let stale = QueueNode {
            task_id: Uuid::new_v4(),
            deadline: Some(NOW + HOUR),
            priority: Some(Priority::High),
            score: -1_000.0,
        };
        queue.insert(stale);
        assert_eq!(queue.peek().unwrap().score, 11.0);
    }

    #[test]
    fn remove_and_sorted_nodes() {
        let clock = Arc::new(ManualClock::new(NOW));
        let mut queue = UrgencyQueue::new(clock);
        let a = task(Priority::High, Some(NOW + HOUR));
        let b = task(Priority::Critical, Some(NOW + HOUR));
        let c = task(Priority::Low, Some(NOW + HOUR));
        queue.build_heap([&a, &b, &c]);

        assert!(queue.remove(b.id));
        assert!(!queue.remove(b.id));
        assert!(!queue.contains(b.id));

        let order = queue
            .sorted_nodes()
            .into_iter()
            .map(|node| node.task_id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![a.id, c.id]);
        assert_eq!(queue.len(), 2);
    }
}
