//! In-memory derived indexes over the task store.
//!
//! # Responsibility
//! - Hold urgency, dependency, schedule and undo structures as caches.
//!
//! # Invariants
//! - Every structure is rebuildable from a full store scan.
//! - Structures never perform I/O; the coordinator brackets them with store calls.

pub mod dependency_graph;
pub mod interval_scheduler;
pub mod undo_stack;
pub mod urgency_queue;
