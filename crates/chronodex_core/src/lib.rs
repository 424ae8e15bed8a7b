//! Core engine of ChronoDex: task store plus the in-memory indexes that
//! answer urgency, dependency, schedule and search queries.
//! This crate is the single source of truth for scheduling invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod index;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, ConfigError, EngineConfig, LogConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
    LoggingStatus,
};
pub use model::task::{Priority, Task, TaskId, TaskStatus, TaskValidationError, TimeWindow};
pub use repo::task_repo::{
    RepoError, RepoResult, SqliteTaskRepository, TaskListQuery, TaskRepository,
};
pub use service::coordinator::{
    BlockedTask, BottleneckReport, CreateTaskRequest, IndexCoordinator, RebuildSummary,
    ServiceError, ServiceResult, TaskUpdate,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
