//! Index coordinator: keeps the in-memory indexes in step with the task store.
//!
//! # Responsibility
//! - Rebuild the urgency queue, dependency graph, interval scheduler, search
//!   trie and undo stack from a full store scan.
//! - Apply every mutation to the store first, then to each affected index,
//!   inside one `&mut self` call.
//! - Hydrate index results (ids) with store records for callers.
//!
//! # Invariants
//! - Every operation except `rebuild` fails with `NotReady` until a rebuild
//!   succeeds.
//! - The dependency graph is acyclic after every public call returns. An edge
//!   change that closes a cycle is compensated in both the store and the graph.
//! - A pending stored task has exactly one queue node; completed tasks have none.
//! - No index is touched when the store call of an operation fails.

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::index::dependency_graph::DependencyGraph;
use crate::index::interval_scheduler::{
    IntervalEntry, IntervalError, IntervalScheduler, MergedInterval,
};
use crate::index::undo_stack::{UndoEntry, UndoError, UndoOperation, UndoStack};
use crate::index::urgency_queue::{urgency_score, QueueNode, UrgencyQueue};
use crate::model::task::{dedup_task_ids, Priority, Task, TaskId, TaskStatus, TaskValidationError};
use crate::repo::task_repo::{RepoError, TaskListQuery, TaskRepository};
use crate::search::trie::SearchTrie;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Upper bound of ids bound into one store lookup.
const ID_LOOKUP_CHUNK: usize = 500;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Coordinator error surfaced to callers verbatim.
#[derive(Debug)]
pub enum ServiceError {
    /// Missing or malformed input. No index was touched.
    Validation(String),
    /// The requested window overlaps scheduled tasks. Nothing was stored.
    Conflict { conflicts: Vec<IntervalEntry> },
    /// The change would close a prerequisite cycle and was rolled back.
    Cycle { task_id: TaskId },
    PrerequisitesUnmet { task_id: TaskId, missing: Vec<TaskId> },
    NotFound(TaskId),
    EmptyStack,
    InvalidInterval { start: i64, end: i64 },
    /// No successful `rebuild` yet.
    NotReady,
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "validation failed: {message}"),
            Self::Conflict { conflicts } => write!(
                f,
                "time slot conflicts with {} scheduled task(s)",
                conflicts.len()
            ),
            Self::Cycle { task_id } => {
                write!(f, "task {task_id} would create a circular dependency")
            }
            Self::PrerequisitesUnmet { task_id, missing } => write!(
                f,
                "task {task_id} has {} unfinished prerequisite(s)",
                missing.len()
            ),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::EmptyStack => write!(f, "nothing to undo"),
            Self::InvalidInterval { start, end } => write!(
                f,
                "invalid interval: start {start} must be less than end {end}"
            ),
            Self::NotReady => write!(f, "indexes are not built yet"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err.to_string()),
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<TaskValidationError> for ServiceError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<IntervalError> for ServiceError {
    fn from(value: IntervalError) -> Self {
        match value {
            IntervalError::InvalidRange { start, end } => Self::InvalidInterval { start, end },
        }
    }
}

impl From<UndoError> for ServiceError {
    fn from(value: UndoError) -> Self {
        match value {
            UndoError::Empty => Self::EmptyStack,
            other => Self::Validation(other.to_string()),
        }
    }
}

/// Input for `create_task`. Title, deadline and priority are required.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTaskRequest {
    /// Caller-provided identity for imports. A v4 UUID is assigned when absent.
    pub id: Option<TaskId>,
    pub title: String,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub deadline: i64,
    pub priority: Priority,
    pub duration_minutes: Option<i64>,
    pub prerequisites: Vec<TaskId>,
}

impl CreateTaskRequest {
    pub fn new(title: impl Into<String>, deadline: i64, priority: Priority) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            deadline,
            priority,
            duration_minutes: None,
            prerequisites: Vec::new(),
        }
    }
}

/// Partial update. `None` leaves a field unchanged; nested `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub deadline: Option<Option<i64>>,
    pub priority: Option<Priority>,
    pub duration_minutes: Option<Option<i64>>,
    pub status: Option<TaskStatus>,
    pub prerequisites: Option<Vec<TaskId>>,
}

/// `{id, title}` of a task blocked by a bottleneck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedTask {
    pub id: TaskId,
    pub title: String,
}

/// Hydrated bottleneck row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BottleneckReport {
    pub task_id: TaskId,
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub blocked_count: usize,
    pub blocked_tasks: Vec<BlockedTask>,
}

/// Per-structure counts after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildSummary {
    pub tasks: usize,
    pub queued: usize,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    pub intervals: usize,
    pub indexed_titles: usize,
}

/// Owner of the five in-memory indexes and the store handle.
pub struct IndexCoordinator<R: TaskRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    queue: UrgencyQueue,
    graph: DependencyGraph,
    scheduler: IntervalScheduler,
    trie: SearchTrie,
    undo: UndoStack,
    ready: bool,
}

impl<R: TaskRepository> IndexCoordinator<R> {
    /// Creates an empty, not-ready coordinator. Call `rebuild` before use.
    pub fn new(repo: R, config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            queue: UrgencyQueue::new(Arc::clone(&clock)),
            clock,
            graph: DependencyGraph::new(),
            scheduler: IntervalScheduler::new(),
            trie: SearchTrie::new(),
            undo: UndoStack::with_capacity(config.undo_capacity),
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Number of deletions that can still be undone.
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Whether the dependency graph currently holds a cycle. False after every
    /// public call returns.
    pub fn has_dependency_cycle(&self) -> bool {
        self.graph.detect_cycle()
    }

    /// Repopulates every index from a full store scan.
    ///
    /// The undo stack is kept. On failure the coordinator stays not ready.
    pub fn rebuild(&mut self) -> ServiceResult<RebuildSummary> {
        let started = Instant::now();
        info!("event=index_rebuild module=coordinator status=start");
        self.ready = false;
        self.queue.clear();
        self.graph.clear();
        self.scheduler.clear();
        self.trie.clear();

        let tasks = self.repo.list_tasks(&TaskListQuery::default()).inspect_err(|err| {
            error!("event=index_rebuild module=coordinator status=error error={err}");
        })?;

        for task in &tasks {
            self.graph.add_task(task.id);
            for prerequisite in &task.prerequisites {
                self.graph.add_dependency(*prerequisite, task.id);
            }
            self.trie.insert(&task.title, task.id);
            if let Some(window) = task.time_window() {
                self.scheduler.add_interval(window.start, window.end, task.id)?;
            }
        }
        self.queue
            .build_heap(tasks.iter().filter(|task| task.status.is_pending()));

        if let Some(task_id) = self.graph.cycle_member() {
            error!(
                "event=index_rebuild module=coordinator status=error reason=cycle task_id={task_id}"
            );
            return Err(ServiceError::Cycle { task_id });
        }

        self.ready = true;
        let summary = RebuildSummary {
            tasks: tasks.len(),
            queued: self.queue.len(),
            graph_nodes: self.graph.node_count(),
            graph_edges: self.graph.edge_count(),
            intervals: self.scheduler.len(),
            indexed_titles: self.trie.len(),
        };
        info!(
            "event=index_rebuild module=coordinator status=ok tasks={} queued={} nodes={} edges={} intervals={} titles={} duration_ms={}",
            summary.tasks,
            summary.queued,
            summary.graph_nodes,
            summary.graph_edges,
            summary.intervals,
            summary.indexed_titles,
            started.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Stores a new task and registers it in every index.
    ///
    /// Fails with `Conflict` before storing when its window overlaps a
    /// scheduled task, and with `Cycle` (after a compensating delete) when its
    /// prerequisites close a cycle.
    pub fn create_task(&mut self, request: CreateTaskRequest) -> ServiceResult<Task> {
        self.ensure_ready()?;
        let now_ms = self.clock.now_ms();

        let mut task = Task::with_id(
            request.id.unwrap_or_else(Uuid::new_v4),
            request.title,
            request.priority,
        );
        task.description = request.description;
        task.deadline = Some(request.deadline);
        task.duration_minutes = request.duration_minutes;
        task.estimated_duration_minutes = request.duration_minutes;
        task.prerequisites = dedup_task_ids(request.prerequisites);
        task.validate().inspect_err(|err| {
            warn!("event=task_create module=coordinator status=rejected reason=validation error={err}");
        })?;

        if let Some(window) = task.time_window() {
            let conflicts = self.scheduler.find_conflicts(window.start, window.end);
            if !conflicts.is_empty() {
                warn!(
                    "event=task_create module=coordinator status=rejected reason=conflict conflicts={}",
                    conflicts.len()
                );
                return Err(ServiceError::Conflict { conflicts });
            }
        }

        task.priority_score = Some(urgency_score(task.deadline, Some(task.priority), now_ms));
        self.repo.create_task(&task)?;

        let fresh = self.link_prerequisites(task.id, &task.prerequisites);
        if let Some(member) = self.graph.cycle_member() {
            warn!(
                "event=task_create module=coordinator status=rejected reason=cycle task_id={} cycle_member={member}",
                task.id
            );
            self.unlink_prerequisites(task.id, &fresh, &[]);
            self.graph.prune_if_isolated(task.id);
            self.compensate_delete(task.id)?;
            return Err(ServiceError::Cycle { task_id: task.id });
        }

        self.trie.insert(&task.title, task.id);
        if let Some(window) = task.time_window() {
            self.scheduler.add_interval(window.start, window.end, task.id)?;
        }
        self.queue.insert(QueueNode::from_task(&task, now_ms));

        info!(
            "event=task_create module=coordinator status=ok task_id={} prerequisites={}",
            task.id,
            task.prerequisites.len()
        );
        Ok(task)
    }

    /// Applies a partial update and resynchronizes the affected indexes.
    ///
    /// Setting `status = completed` enforces the same prerequisite check as
    /// `complete_task`. A prerequisite change that closes a cycle restores
    /// the previous store record and fails with `Cycle`.
    pub fn update_task(&mut self, id: TaskId, update: TaskUpdate) -> ServiceResult<Task> {
        self.ensure_ready()?;
        let now_ms = self.clock.now_ms();
        let existing = self.repo.get_task(id)?.ok_or(ServiceError::NotFound(id))?;

        let mut task = existing.clone();
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(deadline) = update.deadline {
            task.deadline = deadline;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(duration) = update.duration_minutes {
            if duration != task.duration_minutes {
                task.estimated_duration_minutes = duration;
            }
            task.duration_minutes = duration;
        }
        let prerequisites_changed = match update.prerequisites {
            Some(prerequisites) => {
                task.prerequisites = dedup_task_ids(prerequisites);
                task.prerequisites != existing.prerequisites
            }
            None => false,
        };
        task.validate()?;

        match update.status {
            Some(TaskStatus::Completed) if !existing.is_completed() => {
                let completed = self.completed_ids()?;
                let missing = task
                    .prerequisites
                    .iter()
                    .copied()
                    .filter(|prerequisite| !completed.contains(prerequisite))
                    .collect::<Vec<_>>();
                if !missing.is_empty() {
                    warn!(
                        "event=task_update module=coordinator status=rejected reason=prerequisites task_id={id} missing={}",
                        missing.len()
                    );
                    return Err(ServiceError::PrerequisitesUnmet { task_id: id, missing });
                }
                task.mark_completed(now_ms);
            }
            Some(status) if status != TaskStatus::Completed => {
                task.status = status;
                task.completed_at = None;
            }
            _ => {}
        }

        task.priority_score = Some(urgency_score(task.deadline, Some(task.priority), now_ms));
        self.repo.update_task(&task)?;

        if prerequisites_changed {
            let previous = self.graph.clear_prerequisites(id);
            let fresh = self.link_prerequisites(id, &task.prerequisites);
            if let Some(member) = self.graph.cycle_member() {
                warn!(
                    "event=task_update module=coordinator status=rejected reason=cycle task_id={id} cycle_member={member}"
                );
                self.unlink_prerequisites(id, &fresh, &previous);
                if let Err(err) = self.repo.update_task(&existing) {
                    error!(
                        "event=task_update module=coordinator status=error reason=rollback_failed task_id={id} error={err}"
                    );
                    return Err(err.into());
                }
                return Err(ServiceError::Cycle { task_id: id });
            }
            let dropped = previous
                .into_iter()
                .filter(|prerequisite| !task.prerequisites.contains(prerequisite))
                .collect::<Vec<_>>();
            self.prune_placeholders(&dropped)?;
        }

        if task.title != existing.title {
            self.trie.reindex(&task.title, id);
        }
        self.reschedule(&task, "task_update")?;
        self.queue.remove(id);
        if task.status.is_pending() {
            self.queue.insert(QueueNode::from_task(&task, now_ms));
        }

        info!(
            "event=task_update module=coordinator status=ok task_id={id} task_status={} prerequisites_changed={prerequisites_changed}",
            task.status.as_str()
        );
        Ok(task)
    }

    /// Marks a task completed once every prerequisite is completed.
    ///
    /// The completed set is read from the store on every call.
    pub fn complete_task(&mut self, id: TaskId) -> ServiceResult<Task> {
        self.ensure_ready()?;
        let mut task = self.repo.get_task(id)?.ok_or(ServiceError::NotFound(id))?;
        if task.is_completed() {
            return Ok(self.scored(task));
        }

        let completed = self.completed_ids()?;
        let missing = self.graph.missing_prerequisites(id, &completed);
        if !missing.is_empty() {
            warn!(
                "event=task_complete module=coordinator status=rejected task_id={id} missing={}",
                missing.len()
            );
            return Err(ServiceError::PrerequisitesUnmet { task_id: id, missing });
        }

        let now_ms = self.clock.now_ms();
        task.mark_completed(now_ms);
        task.priority_score = Some(urgency_score(task.deadline, Some(task.priority), now_ms));
        self.repo.update_task(&task)?;
        self.queue.remove(id);

        info!("event=task_complete module=coordinator status=ok task_id={id}");
        Ok(task)
    }

    /// Deletes a task and records an undo entry. Returns the deleted record.
    pub fn delete_task(&mut self, id: TaskId) -> ServiceResult<Task> {
        self.ensure_ready()?;
        let task = self.repo.get_task(id)?.ok_or(ServiceError::NotFound(id))?;
        let entry = UndoEntry::deleted(task.clone(), self.clock.now_ms());
        entry.validate()?;

        self.repo.delete_task(id)?;
        self.undo.push(entry)?;

        self.queue.remove(id);
        self.trie.remove(id);
        self.scheduler.remove_task(id);
        let former = self.graph.detach_task(id);
        self.prune_placeholders(&former)?;

        info!(
            "event=task_delete module=coordinator status=ok task_id={id} undo_depth={}",
            self.undo.len()
        );
        Ok(task)
    }

    /// Restores the most recently deleted task into the store and every index.
    pub fn undo_last_delete(&mut self) -> ServiceResult<Task> {
        self.ensure_ready()?;
        let entry = self.undo.pop()?;
        match entry.operation {
            UndoOperation::Delete => {}
        }

        let now_ms = self.clock.now_ms();
        let mut task = entry.snapshot.clone();
        task.priority_score = Some(urgency_score(task.deadline, Some(task.priority), now_ms));

        if let Err(err) = self.repo.create_task(&task) {
            error!(
                "event=task_undo module=coordinator status=error task_id={} error={err}",
                task.id
            );
            self.undo.push(entry)?;
            return Err(err.into());
        }

        let fresh = self.link_prerequisites(task.id, &task.prerequisites);
        if let Some(member) = self.graph.cycle_member() {
            warn!(
                "event=task_undo module=coordinator status=rejected reason=cycle task_id={} cycle_member={member}",
                task.id
            );
            self.unlink_prerequisites(task.id, &fresh, &[]);
            self.graph.prune_if_isolated(task.id);
            self.compensate_delete(task.id)?;
            self.undo.push(entry)?;
            return Err(ServiceError::Cycle { task_id: task.id });
        }

        self.trie.insert(&task.title, task.id);
        self.reschedule(&task, "task_undo")?;
        if task.status.is_pending() {
            self.queue.insert(QueueNode::from_task(&task, now_ms));
        }

        info!(
            "event=task_undo module=coordinator status=ok task_id={} undo_depth={}",
            task.id,
            self.undo.len()
        );
        Ok(task)
    }

    /// Pending tasks by ascending live score, then completed tasks in store order.
    pub fn list_by_urgency(&mut self) -> ServiceResult<Vec<Task>> {
        self.ensure_ready()?;
        let tasks = self.repo.list_tasks(&TaskListQuery::default())?;
        let (pending, completed): (Vec<Task>, Vec<Task>) =
            tasks.into_iter().partition(|task| task.status.is_pending());

        self.queue.build_heap(pending.iter());
        let mut by_id = pending
            .into_iter()
            .map(|task| (task.id, task))
            .collect::<HashMap<_, _>>();

        let mut ordered = Vec::with_capacity(by_id.len() + completed.len());
        for node in self.queue.sorted_nodes() {
            if let Some(mut task) = by_id.remove(&node.task_id) {
                task.priority_score = Some(node.score);
                ordered.push(task);
            }
        }
        ordered.extend(completed.into_iter().map(|task| self.scored(task)));
        Ok(ordered)
    }

    /// Head of the urgency queue after a refresh pass.
    pub fn most_urgent(&mut self) -> ServiceResult<Option<Task>> {
        self.ensure_ready()?;
        self.queue.refresh();
        let Some(task_id) = self.queue.peek().map(|node| node.task_id) else {
            return Ok(None);
        };
        Ok(self.repo.get_task(task_id)?.map(|task| self.scored(task)))
    }

    /// Tasks with a title word starting with `prefix`, in trie order.
    pub fn search(&self, prefix: &str) -> ServiceResult<Vec<Task>> {
        self.ensure_ready()?;
        if prefix.trim().is_empty() {
            return Err(ServiceError::Validation(
                "search query must not be blank".to_string(),
            ));
        }

        let ids = self.trie.search(prefix);
        let mut by_id = self.fetch_by_ids(&ids)?;

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|task| self.scored(task))
            .collect())
    }

    /// Scheduled intervals overlapping `[start, end)`.
    pub fn find_conflicts(&self, start: i64, end: i64) -> ServiceResult<Vec<IntervalEntry>> {
        self.ensure_ready()?;
        if start >= end {
            return Err(ServiceError::InvalidInterval { start, end });
        }
        Ok(self.scheduler.find_conflicts(start, end))
    }

    /// Coalesced busy ranges. Read-only view over the live interval list.
    pub fn busy_blocks(&self) -> ServiceResult<Vec<MergedInterval>> {
        self.ensure_ready()?;
        Ok(self.scheduler.merge_intervals())
    }

    /// Unfinished stored tasks ranked by how many tasks they transitively block.
    pub fn bottlenecks(&self) -> ServiceResult<Vec<BottleneckReport>> {
        self.ensure_ready()?;
        let ranked = self.graph.bottleneck_tasks();
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ranked
            .iter()
            .flat_map(|bottleneck| {
                std::iter::once(bottleneck.task_id)
                    .chain(bottleneck.blocked_task_ids.iter().copied())
            })
            .collect::<HashSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let by_id = self.fetch_by_ids(&ids)?;

        let mut reports = ranked
            .into_iter()
            .filter_map(|bottleneck| {
                let task = by_id.get(&bottleneck.task_id)?;
                if task.is_completed() {
                    return None;
                }
                let blocked_tasks = bottleneck
                    .blocked_task_ids
                    .iter()
                    .filter_map(|id| by_id.get(id))
                    .map(|blocked| BlockedTask {
                        id: blocked.id,
                        title: blocked.title.clone(),
                    })
                    .collect();
                Some(BottleneckReport {
                    task_id: task.id,
                    title: task.title.clone(),
                    priority: task.priority,
                    status: task.status,
                    blocked_count: bottleneck.blocked_count,
                    blocked_tasks,
                })
            })
            .collect::<Vec<_>>();
        reports.sort_by(|a, b| b.blocked_count.cmp(&a.blocked_count));
        Ok(reports)
    }

    /// Stored task ids with prerequisites before dependents.
    pub fn execution_order(&self) -> ServiceResult<Vec<TaskId>> {
        self.ensure_ready()?;
        let started = Instant::now();
        let order = self.graph.resolve();
        let elapsed = started.elapsed();

        let stored = self
            .repo
            .distinct_task_ids(&TaskListQuery::default())?
            .into_iter()
            .collect::<HashSet<_>>();
        let order = order
            .into_iter()
            .filter(|id| stored.contains(id))
            .collect::<Vec<_>>();
        info!(
            "event=execution_order module=coordinator status=ok tasks={} duration_us={}",
            order.len(),
            elapsed.as_micros()
        );
        Ok(order)
    }

    /// One stored task with its live score.
    pub fn get_task(&self, id: TaskId) -> ServiceResult<Task> {
        self.ensure_ready()?;
        let task = self.repo.get_task(id)?.ok_or(ServiceError::NotFound(id))?;
        Ok(self.scored(task))
    }

    /// Recomputes and persists every stored score, then reloads the queue.
    ///
    /// Returns the number of tasks rescored.
    pub fn recalculate_scores(&mut self) -> ServiceResult<usize> {
        self.ensure_ready()?;
        let now_ms = self.clock.now_ms();
        let mut tasks = self.repo.list_tasks(&TaskListQuery::default())?;
        for task in &mut tasks {
            task.priority_score = Some(urgency_score(task.deadline, Some(task.priority), now_ms));
            self.repo.update_task(task)?;
        }
        self.queue
            .build_heap(tasks.iter().filter(|task| task.status.is_pending()));

        info!(
            "event=score_recalculate module=coordinator status=ok tasks={}",
            tasks.len()
        );
        Ok(tasks.len())
    }

    /// Deletes every stored task and resets all indexes, undo history included.
    pub fn clear_all(&mut self) -> ServiceResult<usize> {
        self.ensure_ready()?;
        let removed = self.repo.delete_all_tasks()?;
        self.queue.clear();
        self.graph.clear();
        self.scheduler.clear();
        self.trie.clear();
        self.undo.clear();

        info!("event=clear_all module=coordinator status=ok removed={removed}");
        Ok(removed)
    }

    fn ensure_ready(&self) -> ServiceResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(ServiceError::NotReady)
        }
    }

    fn scored(&self, mut task: Task) -> Task {
        task.priority_score = Some(urgency_score(
            task.deadline,
            Some(task.priority),
            self.clock.now_ms(),
        ));
        task
    }

    fn fetch_by_ids(&self, ids: &[TaskId]) -> ServiceResult<HashMap<TaskId, Task>> {
        let mut by_id = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(ID_LOOKUP_CHUNK) {
            let tasks = self
                .repo
                .list_tasks(&TaskListQuery::with_ids(chunk.iter().copied()))?;
            by_id.extend(tasks.into_iter().map(|task| (task.id, task)));
        }
        Ok(by_id)
    }

    fn completed_ids(&self) -> ServiceResult<HashSet<TaskId>> {
        Ok(self
            .repo
            .distinct_task_ids(&TaskListQuery::with_status(TaskStatus::Completed))?
            .into_iter()
            .collect())
    }

    /// Adds `prerequisite -> id` edges. Returns prerequisites that were not
    /// graph nodes before.
    fn link_prerequisites(&mut self, id: TaskId, prerequisites: &[TaskId]) -> Vec<TaskId> {
        self.graph.add_task(id);
        let mut fresh = Vec::new();
        for prerequisite in prerequisites {
            if !self.graph.contains(*prerequisite) {
                fresh.push(*prerequisite);
            }
            self.graph.add_dependency(*prerequisite, id);
        }
        fresh
    }

    /// Reverts `link_prerequisites`, then re-adds `previous` edges.
    ///
    /// `id` itself stays registered; callers rolling back a new record prune it.
    fn unlink_prerequisites(&mut self, id: TaskId, fresh: &[TaskId], previous: &[TaskId]) {
        self.graph.clear_prerequisites(id);
        for prerequisite in fresh {
            self.graph.prune_if_isolated(*prerequisite);
        }
        for prerequisite in previous {
            self.graph.add_dependency(*prerequisite, id);
        }
    }

    /// Drops placeholder nodes of deleted tasks that no stored task references anymore.
    fn prune_placeholders(&mut self, candidates: &[TaskId]) -> ServiceResult<()> {
        for candidate in candidates {
            if self.repo.get_task(*candidate)?.is_none() {
                self.graph.prune_if_isolated(*candidate);
            }
        }
        Ok(())
    }

    fn compensate_delete(&mut self, id: TaskId) -> ServiceResult<()> {
        self.repo.delete_task(id).map_err(|err| {
            error!(
                "event=cycle_rollback module=coordinator status=error task_id={id} error={err}"
            );
            ServiceError::from(err)
        })
    }

    /// Re-adds the task window without a conflict check; overlaps are logged.
    fn reschedule(&mut self, task: &Task, event: &str) -> ServiceResult<()> {
        self.scheduler.remove_task(task.id);
        let Some(window) = task.time_window() else {
            return Ok(());
        };
        let overlaps = self.scheduler.find_conflicts(window.start, window.end).len();
        if overlaps > 0 {
            warn!(
                "event={event} module=coordinator status=ok task_id={} overlapping_intervals={overlaps}",
                task.id
            );
        }
        self.scheduler.add_interval(window.start, window.end, task.id)?;
        Ok(())
    }
}
