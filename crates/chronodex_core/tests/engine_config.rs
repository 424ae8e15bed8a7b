use chronodex_core::{load_config, ConfigError, EngineConfig};
use std::io::Write;
use std::path::PathBuf;

#[test]
fn load_config_reads_file_and_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tasks.db");
    let log_dir = dir.path().join("logs");
    let config_path = dir.path().join("engine.json");

    let document = serde_json::json!({
        "undo_capacity": 25,
        "database_path": db_path,
        "log": { "dir": log_dir },
    });
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(document.to_string().as_bytes()).unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.undo_capacity, 25);
    assert_eq!(config.database_path, Some(db_path));
    assert_eq!(config.log.dir, Some(log_dir));
    assert_eq!(config.log.level, EngineConfig::default().log.level);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");

    match load_config(&path) {
        Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"undo_capacity": 0}"#).unwrap();

    assert!(matches!(
        load_config(file.path()),
        Err(ConfigError::ZeroUndoCapacity)
    ));
}

#[test]
fn config_roundtrips_through_json() {
    let config = EngineConfig {
        undo_capacity: 3,
        database_path: Some(PathBuf::from("/var/lib/chronodex/tasks.db")),
        ..EngineConfig::default()
    };
    let raw = serde_json::to_string(&config).unwrap();
    assert_eq!(EngineConfig::from_json_str(&raw).unwrap(), config);
}
