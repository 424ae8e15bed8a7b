//! Bounded undo stack of reversible task operations.
//!
//! # Responsibility
//! - Keep the most recent reversible operations, newest first on `pop`.
//! - Evict the oldest entry once capacity is reached.
//!
//! # Invariants
//! - `len() <= capacity()` and `capacity() >= 1`.
//! - Entries are validated on `push`.

use crate::model::task::{Task, TaskValidationError};
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_UNDO_CAPACITY: usize = 10;

/// Kind of operation an entry can reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOperation {
    Delete,
}

/// One reversible operation with the full record needed to restore it.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub operation: UndoOperation,
    pub snapshot: Task,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
}

impl UndoEntry {
    pub fn deleted(snapshot: Task, timestamp_ms: i64) -> Self {
        Self {
            operation: UndoOperation::Delete,
            snapshot,
            timestamp_ms,
        }
    }

    pub fn validate(&self) -> Result<(), UndoError> {
        if self.timestamp_ms < 0 {
            return Err(UndoError::InvalidTimestamp(self.timestamp_ms));
        }
        self.snapshot.validate().map_err(UndoError::InvalidSnapshot)
    }
}

/// Undo stack error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoError {
    Empty,
    InvalidSnapshot(TaskValidationError),
    InvalidTimestamp(i64),
}

impl Display for UndoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "undo stack is empty"),
            Self::InvalidSnapshot(err) => write!(f, "invalid undo snapshot: {err}"),
            Self::InvalidTimestamp(value) => write!(f, "invalid undo timestamp {value}"),
        }
    }
}

impl Error for UndoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSnapshot(err) => Some(err),
            Self::Empty | Self::InvalidTimestamp(_) => None,
        }
    }
}

/// Capacity-limited LIFO over a ring buffer.
#[derive(Debug)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoStack {
    /// Creates a stack holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes a validated entry, evicting the oldest one when full.
    pub fn push(&mut self, entry: UndoEntry) -> Result<(), UndoError> {
        entry.validate()?;
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        Ok(())
    }

    /// Removes and returns the most recent entry.
    pub fn pop(&mut self) -> Result<UndoEntry, UndoError> {
        self.entries.pop_back().ok_or(UndoError::Empty)
    }

    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{UndoEntry, UndoError, UndoStack};
    use crate::model::task::{Priority, Task};

    fn entry(title: &str, timestamp_ms: i64) -> UndoEntry {
        UndoEntry::deleted(Task::new(title, Priority::Medium), timestamp_ms)
    }

    #[test]
    fn pop_on_empty_is_an_error() {
        let mut stack = UndoStack::default();
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), Err(UndoError::Empty));
    }

    #[test]
    fn eleventh_push_evicts_the_oldest() {
        let mut stack = UndoStack::with_capacity(10);
        for index in 1..=11 {
            stack.push(entry(&format!("task {index}"), index)).unwrap();
        }
        assert_eq!(stack.len(), 10);

        let popped = std::iter::from_fn(|| stack.pop().ok())
            .map(|entry| entry.timestamp_ms)
            .collect::<Vec<_>>();
        assert_eq!(popped, (2..=11).rev().collect::<Vec<_>>());
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let mut stack = UndoStack::default();
        assert_eq!(
            stack.push(entry("ok", -5)),
            Err(UndoError::InvalidTimestamp(-5))
        );
        assert!(matches!(
            stack.push(entry("  ", 1)),
            Err(UndoError::InvalidSnapshot(_))
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut stack = UndoStack::with_capacity(0);
        assert_eq!(stack.capacity(), 1);
        stack.push(entry("first", 1)).unwrap();
        stack.push(entry("second", 2)).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek().unwrap().snapshot.title, "second");
    }
}
