//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract the index coordinator consumes.
//! - Isolate SQLite query details from coordinator orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Task::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyExists`) in
//!   addition to DB transport errors.

pub mod task_repo;
