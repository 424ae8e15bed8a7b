//! Task domain model.
//!
//! # Responsibility
//! - Define canonical data structures shared by the store and the indexes.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - The persistent store owns task records; indexes hold projections only.

pub mod task;
