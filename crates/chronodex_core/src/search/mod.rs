//! Title search entry points.
//!
//! # Responsibility
//! - Expose prefix lookup over task title words.

pub mod trie;
