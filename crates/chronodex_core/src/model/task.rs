//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record owned by the persistent store.
//! - Derive projections used by the in-memory indexes (time window, score input).
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `title` is never blank.
//! - `prerequisites` never contains duplicates or the task's own id.
//! - `duration_minutes`, when set, is strictly positive and at most
//!   `MAX_DURATION_MINUTES`.
//! - `deadline`, when set, lies within `±MAX_TIMESTAMP_MS`, so window
//!   arithmetic on a validated task never overflows.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable, store-assigned identifier of a task.
pub type TaskId = Uuid;

const MS_PER_MINUTE: i64 = 60 * 1000;
/// Largest accepted deadline magnitude in epoch milliseconds (±100,000,000 days).
pub const MAX_TIMESTAMP_MS: i64 = 8_640_000_000_000_000;
/// Longest accepted planned duration: the whole timestamp range.
pub const MAX_DURATION_MINUTES: i64 = MAX_TIMESTAMP_MS / MS_PER_MINUTE;

/// Priority class of a task. Lower classes are less urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Stable string form used by the store and wire payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// Parses a priority class case-insensitively.
    ///
    /// Returns `None` for unknown values; callers scoring a `None` priority
    /// fall back to `Low`'s weight.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "to-do")]
    Todo,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    /// Stable string form used by the store and wire payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "to-do",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "to-do" => Some(Self::Todo),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_pending(self) -> bool {
        self != Self::Completed
    }
}

/// Half-open scheduled window `[start, end)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

/// Validation failures for task records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    BlankTitle,
    NonPositiveDuration(i64),
    DurationTooLong(i64),
    DeadlineOutOfRange(i64),
    SelfPrerequisite(TaskId),
    DuplicatePrerequisite(TaskId),
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "task title must not be blank"),
            Self::NonPositiveDuration(minutes) => {
                write!(f, "task duration must be positive, got {minutes} minutes")
            }
            Self::DurationTooLong(minutes) => write!(
                f,
                "task duration must be at most {MAX_DURATION_MINUTES} minutes, got {minutes}"
            ),
            Self::DeadlineOutOfRange(deadline) => write!(
                f,
                "task deadline must be within ±{MAX_TIMESTAMP_MS} ms, got {deadline}"
            ),
            Self::SelfPrerequisite(id) => write!(f, "task {id} cannot depend on itself"),
            Self::DuplicatePrerequisite(id) => write!(f, "duplicate prerequisite {id}"),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
///
/// Owned by the persistent store; the indexes keep only lightweight
/// projections keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub deadline: Option<i64>,
    pub priority: Priority,
    /// Planned duration in minutes.
    #[serde(rename = "duration")]
    pub duration_minutes: Option<i64>,
    #[serde(rename = "estimatedDuration")]
    pub estimated_duration_minutes: Option<i64>,
    /// Measured duration in minutes, two decimals.
    #[serde(rename = "actualDuration")]
    pub actual_duration_minutes: Option<f64>,
    pub status: TaskStatus,
    pub prerequisites: Vec<TaskId>,
    /// Cached urgency score. Recomputed on every read path; not authoritative.
    pub priority_score: Option<f64>,
    /// Epoch milliseconds.
    pub completed_at: Option<i64>,
}

impl Task {
    /// Creates a to-do task with a generated stable ID.
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        Self::with_id(Uuid::new_v4(), title, priority)
    }

    /// Creates a to-do task with a caller-provided stable ID.
    ///
    /// Used by import and undo paths where identity already exists.
    pub fn with_id(id: TaskId, title: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            deadline: None,
            priority,
            duration_minutes: None,
            estimated_duration_minutes: None,
            actual_duration_minutes: None,
            status: TaskStatus::Todo,
            prerequisites: Vec::new(),
            priority_score: None,
            completed_at: None,
        }
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        if let Some(minutes) = self.duration_minutes {
            if minutes <= 0 {
                return Err(TaskValidationError::NonPositiveDuration(minutes));
            }
            if minutes > MAX_DURATION_MINUTES {
                return Err(TaskValidationError::DurationTooLong(minutes));
            }
        }
        if let Some(deadline) = self.deadline {
            if !(-MAX_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&deadline) {
                return Err(TaskValidationError::DeadlineOutOfRange(deadline));
            }
        }
        for (index, prerequisite) in self.prerequisites.iter().enumerate() {
            if *prerequisite == self.id {
                return Err(TaskValidationError::SelfPrerequisite(self.id));
            }
            if self.prerequisites[..index].contains(prerequisite) {
                return Err(TaskValidationError::DuplicatePrerequisite(*prerequisite));
            }
        }
        Ok(())
    }

    /// Scheduled window ending at the deadline, when deadline and duration are known.
    ///
    /// `None` as well when the window is not representable, which only an
    /// unvalidated record can reach.
    pub fn time_window(&self) -> Option<TimeWindow> {
        let deadline = self.deadline?;
        let span = self.duration_minutes?.checked_mul(MS_PER_MINUTE)?;
        Some(TimeWindow {
            start: deadline.checked_sub(span)?,
            end: deadline,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Stamps completion bookkeeping at `now_ms`.
    ///
    /// The measured duration assumes work started at `deadline - duration`.
    pub fn mark_completed(&mut self, now_ms: i64) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now_ms);
        if self.estimated_duration_minutes.is_none() {
            self.estimated_duration_minutes = self.duration_minutes;
        }
        let elapsed = self
            .time_window()
            .and_then(|window| now_ms.checked_sub(window.start));
        if let Some(elapsed) = elapsed {
            let minutes = elapsed as f64 / MS_PER_MINUTE as f64;
            self.actual_duration_minutes = Some((minutes * 100.0).round() / 100.0);
        }
    }
}

/// Removes duplicates while keeping first-seen order.
pub fn dedup_task_ids(ids: impl IntoIterator<Item = TaskId>) -> Vec<TaskId> {
    let mut unique = Vec::new();
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::{
        dedup_task_ids, Priority, Task, TaskStatus, TaskValidationError, MAX_DURATION_MINUTES,
        MAX_TIMESTAMP_MS,
    };
    use uuid::Uuid;

    #[test]
    fn priority_parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(Priority::parse(" HIGH "), Some(Priority::High));
        assert_eq!(Priority::parse("critical"), Some(Priority::Critical));
        assert_eq!(Priority::parse("urgent"), None);
    }

    #[test]
    fn status_string_forms_roundtrip() {
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("pending"), None);
    }

    #[test]
    fn validate_rejects_self_and_duplicate_prerequisites() {
        let mut task = Task::new("write report", Priority::High);
        task.prerequisites = vec![task.id];
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::SelfPrerequisite(task.id))
        );

        let other = Uuid::new_v4();
        task.prerequisites = vec![other, other];
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::DuplicatePrerequisite(other))
        );
    }

    #[test]
    fn validate_rejects_blank_title_and_zero_duration() {
        let mut task = Task::new("   ", Priority::Low);
        assert_eq!(task.validate(), Err(TaskValidationError::BlankTitle));

        task.title = "ok".to_string();
        task.duration_minutes = Some(0);
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::NonPositiveDuration(0))
        );
    }

    #[test]
    fn validate_bounds_deadline_and_duration() {
        let mut task = Task::new("far future", Priority::Low);
        task.deadline = Some(MAX_TIMESTAMP_MS);
        task.duration_minutes = Some(MAX_DURATION_MINUTES);
        assert_eq!(task.validate(), Ok(()));
        assert!(task.time_window().is_some());

        task.duration_minutes = Some(i64::MAX / 1000);
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::DurationTooLong(i64::MAX / 1000))
        );

        task.duration_minutes = Some(30);
        task.deadline = Some(i64::MIN);
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::DeadlineOutOfRange(i64::MIN))
        );
    }

    #[test]
    fn unrepresentable_window_is_none_instead_of_wrapping() {
        let mut task = Task::new("overflow", Priority::Low);
        task.deadline = Some(0);
        task.duration_minutes = Some(i64::MAX / 1000);
        assert!(task.time_window().is_none());

        task.deadline = Some(i64::MIN);
        task.duration_minutes = Some(1);
        assert!(task.time_window().is_none());

        task.mark_completed(i64::MAX);
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.actual_duration_minutes.is_none());
    }

    #[test]
    fn time_window_ends_at_deadline() {
        let mut task = Task::new("standup", Priority::Medium);
        assert!(task.time_window().is_none());

        task.deadline = Some(3_600_000);
        task.duration_minutes = Some(30);
        let window = task.time_window().unwrap();
        assert_eq!(window.start, 1_800_000);
        assert_eq!(window.end, 3_600_000);
    }

    #[test]
    fn mark_completed_measures_actual_duration() {
        let mut task = Task::new("deploy", Priority::Critical);
        task.deadline = Some(10 * 60_000);
        task.duration_minutes = Some(10);

        task.mark_completed(5 * 60_000 + 30_000);

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(330_000));
        assert_eq!(task.estimated_duration_minutes, Some(10));
        assert_eq!(task.actual_duration_minutes, Some(5.5));
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(dedup_task_ids([b, a, b, a]), vec![b, a]);
    }
}
