//! Scheduled time windows with overlap queries.
//!
//! # Responsibility
//! - Keep one interval per scheduled task, sorted by start.
//! - Answer half-open overlap queries: `a.start < b.end && a.end > b.start`.
//!
//! # Invariants
//! - Entries are sorted ascending by `start`.
//! - Every entry has `start < end`.
//! - Merged ranges are a report only and never replace the live list.

use crate::model::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Scheduler-local error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalError {
    /// `start >= end`.
    InvalidRange { start: i64, end: i64 },
}

impl Display for IntervalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRange { start, end } => write!(
                f,
                "invalid interval: start {start} must be less than end {end}"
            ),
        }
    }
}

impl Error for IntervalError {}

/// One scheduled window owned by a task, epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalEntry {
    pub start: i64,
    pub end: i64,
    pub task_id: TaskId,
}

impl IntervalEntry {
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        start < self.end && end > self.start
    }
}

/// Coalesced busy range without task ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedInterval {
    pub start: i64,
    pub end: i64,
}

/// Sorted interval list with conflict lookup.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    intervals: Vec<IntervalEntry>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[IntervalEntry] {
        &self.intervals
    }

    /// Inserts `[start, end)` for `task_id`, keeping start order.
    ///
    /// Overlaps are not checked here; callers run `find_conflicts` first.
    pub fn add_interval(&mut self, start: i64, end: i64, task_id: TaskId) -> Result<(), IntervalError> {
        if start >= end {
            return Err(IntervalError::InvalidRange { start, end });
        }
        let position = self.intervals.partition_point(|entry| entry.start <= start);
        self.intervals.insert(
            position,
            IntervalEntry {
                start,
                end,
                task_id,
            },
        );
        Ok(())
    }

    /// Every resident interval overlapping `[start, end)`. Touching ends do not conflict.
    pub fn find_conflicts(&self, start: i64, end: i64) -> Vec<IntervalEntry> {
        self.intervals
            .iter()
            .take_while(|entry| entry.start < end)
            .filter(|entry| entry.overlaps(start, end))
            .copied()
            .collect()
    }

    /// Removes every interval owned by `task_id`. Returns how many were removed.
    pub fn remove_task(&mut self, task_id: TaskId) -> usize {
        let before = self.intervals.len();
        self.intervals.retain(|entry| entry.task_id != task_id);
        before - self.intervals.len()
    }

    /// Coalesces overlapping and back-to-back intervals into busy ranges.
    pub fn merge_intervals(&self) -> Vec<MergedInterval> {
        let mut merged: Vec<MergedInterval> = Vec::new();
        for entry in &self.intervals {
            match merged.last_mut() {
                Some(current) if entry.start <= current.end => {
                    current.end = current.end.max(entry.end);
                }
                _ => merged.push(MergedInterval {
                    start: entry.start,
                    end: entry.end,
                }),
            }
        }
        merged
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{IntervalError, IntervalScheduler, MergedInterval};
    use uuid::Uuid;

    #[test]
    fn touching_boundaries_do_not_conflict() {
        let owner = Uuid::new_v4();
        let mut scheduler = IntervalScheduler::new();
        scheduler.add_interval(100, 200, owner).unwrap();

        assert!(scheduler.find_conflicts(200, 300).is_empty());
        assert!(scheduler.find_conflicts(0, 100).is_empty());

        let conflicts = scheduler.find_conflicts(150, 250);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].task_id, owner);
    }

    #[test]
    fn conflict_check_is_symmetric() {
        let mut forward = IntervalScheduler::new();
        forward.add_interval(100, 200, Uuid::new_v4()).unwrap();
        let mut backward = IntervalScheduler::new();
        backward.add_interval(150, 250, Uuid::new_v4()).unwrap();

        assert_eq!(
            forward.find_conflicts(150, 250).len(),
            backward.find_conflicts(100, 200).len()
        );
    }

    #[test]
    fn containing_and_contained_ranges_conflict() {
        let mut scheduler = IntervalScheduler::new();
        scheduler.add_interval(100, 400, Uuid::new_v4()).unwrap();
        assert_eq!(scheduler.find_conflicts(200, 300).len(), 1);
        assert_eq!(scheduler.find_conflicts(0, 1_000).len(), 1);
    }

    #[test]
    fn add_interval_rejects_empty_and_inverted_ranges() {
        let mut scheduler = IntervalScheduler::new();
        assert_eq!(
            scheduler.add_interval(5, 5, Uuid::new_v4()),
            Err(IntervalError::InvalidRange { start: 5, end: 5 })
        );
        assert!(scheduler.add_interval(9, 3, Uuid::new_v4()).is_err());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn intervals_stay_sorted_by_start() {
        let mut scheduler = IntervalScheduler::new();
        for start in [500, 100, 300, 100, 200] {
            scheduler.add_interval(start, start + 50, Uuid::new_v4()).unwrap();
        }
        let starts = scheduler
            .intervals()
            .iter()
            .map(|entry| entry.start)
            .collect::<Vec<_>>();
        assert_eq!(starts, vec![100, 100, 200, 300, 500]);
    }

    #[test]
    fn merge_is_a_report_and_keeps_live_entries() {
        let a = Uuid::new_v4();
        let mut scheduler = IntervalScheduler::new();
        scheduler.add_interval(0, 10, a).unwrap();
        scheduler.add_interval(10, 20, Uuid::new_v4()).unwrap();
        scheduler.add_interval(15, 30, Uuid::new_v4()).unwrap();
        scheduler.add_interval(40, 50, Uuid::new_v4()).unwrap();

        assert_eq!(
            scheduler.merge_intervals(),
            vec![
                MergedInterval { start: 0, end: 30 },
                MergedInterval { start: 40, end: 50 },
            ]
        );
        assert_eq!(scheduler.len(), 4);
        assert_eq!(scheduler.remove_task(a), 1);
        assert_eq!(scheduler.len(), 3);
    }
}
