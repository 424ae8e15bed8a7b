//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load engine config, open the task store and rebuild the indexes.
//! - Print a deterministic readiness summary and the urgency listing.
//!
//! Usage: `chronodex_cli [config.json]`. The config path may also come from
//! `CHRONODEX_CONFIG`; defaults apply when neither is set.

use chronodex_core::{
    core_version, init_logging_from_config, load_config, open_db, open_db_in_memory, ping,
    EngineConfig, IndexCoordinator, SqliteTaskRepository, SystemClock,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("chronodex error={message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    println!("chronodex_core ping={}", ping());
    println!("chronodex_core version={}", core_version());

    let config = match resolve_config_path() {
        Some(path) => load_config(&path).map_err(|err| err.to_string())?,
        None => EngineConfig::default(),
    };
    let logging = init_logging_from_config(&config).map_err(|err| err.to_string())?;
    println!("logging enabled={}", logging.is_some());

    let conn = match &config.database_path {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| format!("store open failed: {err}"))?;
    let repo = SqliteTaskRepository::try_new(&conn)
        .map_err(|err| format!("store init failed: {err}"))?;

    let mut coordinator = IndexCoordinator::new(repo, &config, Arc::new(SystemClock));
    let summary = coordinator.rebuild().map_err(|err| err.to_string())?;
    info!("event=cli_probe module=cli status=ok tasks={}", summary.tasks);
    println!(
        "rebuild tasks={} queued={} nodes={} edges={} intervals={} titles={}",
        summary.tasks,
        summary.queued,
        summary.graph_nodes,
        summary.graph_edges,
        summary.intervals,
        summary.indexed_titles
    );

    let listing = coordinator.list_by_urgency().map_err(|err| err.to_string())?;
    for task in listing {
        println!(
            "{} status={} priority={} score={:.2}",
            task.id,
            task.status.as_str(),
            task.priority.as_str(),
            task.priority_score.unwrap_or_default()
        );
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Some(arg) = std::env::args_os().nth(1) {
        return Some(PathBuf::from(arg));
    }
    std::env::var("CHRONODEX_CONFIG")
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}
