//! Engine services.
//!
//! # Responsibility
//! - Orchestrate store calls and in-memory index updates into use-case APIs.
//! - Keep transport layers decoupled from storage and index details.

pub mod coordinator;
