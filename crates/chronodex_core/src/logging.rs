//! Engine logging bootstrap.
//!
//! # Responsibility
//! - Start the rotating `chronodex` file log once per process.
//! - Record which engine setup (store mode, undo capacity) the log belongs to,
//!   and stamp it on the startup and panic events.
//!
//! # Invariants
//! - Re-initialization with the active level and directory is a no-op; any
//!   other combination is rejected.
//! - Initialization never panics.
//! - Task titles and descriptions are never written to the log. Panic payloads
//!   are flattened to one line and capped.

use crate::config::EngineConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle,
    Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "chronodex";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE_LOG: OnceCell<ActiveLog> = OnceCell::new();
static ENGINE_CONTEXT: OnceCell<EngineContext> = OnceCell::new();

struct ActiveLog {
    status: LoggingStatus,
    _handle: LoggerHandle,
}

/// Level and directory of the running file log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingStatus {
    pub level: LevelFilter,
    pub log_dir: PathBuf,
}

/// Engine setup stamped on startup and panic events. First config wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EngineContext {
    store: &'static str,
    undo_capacity: usize,
}

impl EngineContext {
    fn from_config(config: &EngineConfig) -> Self {
        Self {
            store: if config.database_path.is_some() {
                "file"
            } else {
                "memory"
            },
            undo_capacity: config.undo_capacity,
        }
    }
}

impl Display for EngineContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "store={} undo_capacity={}", self.store, self.undo_capacity)
    }
}

/// Logging bootstrap failure.
#[derive(Debug)]
pub enum LoggingError {
    UnsupportedLevel(String),
    EmptyDir,
    RelativeDir(PathBuf),
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// A log with a different level or directory is already running.
    AlreadyActive {
        active: LoggingStatus,
        requested: LoggingStatus,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::EmptyDir => write!(f, "log dir cannot be empty"),
            Self::RelativeDir(path) => {
                write!(f, "log dir must be an absolute path, got `{}`", path.display())
            }
            Self::CreateDir { path, source } => write!(
                f,
                "failed to create log directory `{}`: {source}",
                path.display()
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::AlreadyActive { active, requested } => write!(
                f,
                "logging already active with level `{}` at `{}`; refusing to switch to level `{}` at `{}`",
                active.level,
                active.log_dir.display(),
                requested.level,
                requested.log_dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Starts the file log at `level` under `log_dir`.
///
/// # Errors
/// - Unknown level, empty or relative directory.
/// - Directory creation or backend start failure.
/// - `AlreadyActive` when a log with another level or directory runs.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<LoggingStatus, LoggingError> {
    let requested = LoggingStatus {
        level: parse_level(level)?,
        log_dir: checked_log_dir(log_dir.as_ref())?,
    };

    let active = ACTIVE_LOG.get_or_try_init(|| start(&requested))?;
    if active.status != requested {
        return Err(LoggingError::AlreadyActive {
            active: active.status.clone(),
            requested,
        });
    }
    Ok(active.status.clone())
}

/// Starts logging for an engine config. `Ok(None)` when `log.dir` is unset.
///
/// The config's store mode and undo capacity are recorded for later
/// startup and panic events.
pub fn init_logging_from_config(
    config: &EngineConfig,
) -> Result<Option<LoggingStatus>, LoggingError> {
    let context = *ENGINE_CONTEXT.get_or_init(|| EngineContext::from_config(config));
    let Some(dir) = config.log.dir.as_ref() else {
        return Ok(None);
    };
    let status = init_logging(&config.log.level, dir)?;
    info!("event=engine_config module=core status=ok {context}");
    Ok(Some(status))
}

/// Level and directory of the running log, if any.
pub fn logging_status() -> Option<LoggingStatus> {
    ACTIVE_LOG.get().map(|active| active.status.clone())
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(status: &LoggingStatus) -> Result<ActiveLog, LoggingError> {
    std::fs::create_dir_all(&status.log_dir).map_err(|source| LoggingError::CreateDir {
        path: status.log_dir.clone(),
        source,
    })?;

    let handle = Logger::with(LogSpecification::builder().default(status.level).build())
        .log_to_file(
            FileSpec::default()
                .directory(status.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        // [YYYY-MM-DD HH:MM:SS.ffffff TZ] LEVEL [module] file:line: message
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook();
    info!(
        "event=engine_start module=core status=ok platform={} version={} level={} log_dir={} {}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        status.level,
        status.log_dir.display(),
        engine_context_fields()
    );

    Ok(ActiveLog {
        status: status.clone(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    let normalized = level.trim().to_ascii_lowercase();
    let normalized = if normalized == "warning" {
        "warn"
    } else {
        normalized.as_str()
    };
    match LevelFilter::from_str(normalized) {
        Ok(LevelFilter::Off) | Err(_) => Err(LoggingError::UnsupportedLevel(level.to_string())),
        Ok(filter) => Ok(filter),
    }
}

fn checked_log_dir(log_dir: &Path) -> Result<PathBuf, LoggingError> {
    if log_dir.as_os_str().is_empty() {
        return Err(LoggingError::EmptyDir);
    }
    if !log_dir.is_absolute() {
        return Err(LoggingError::RelativeDir(log_dir.to_path_buf()));
    }
    Ok(log_dir.to_path_buf())
}

/// Runs once: `start` is only reached from inside `ACTIVE_LOG`'s initializer.
fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic_captured module=core status=error {} location={location} payload={}",
            engine_context_fields(),
            panic_payload(panic_info)
        );
        previous_hook(panic_info);
    }));
}

fn engine_context_fields() -> String {
    ENGINE_CONTEXT
        .get()
        .map(ToString::to_string)
        .unwrap_or_else(|| "store=unknown".to_string())
}

fn panic_payload(info: &std::panic::PanicHookInfo<'_>) -> String {
    let payload = info
        .payload()
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    single_line_capped(&payload, MAX_PANIC_PAYLOAD_CHARS)
}

// Payloads may quote task content.
fn single_line_capped(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut capped = flattened.chars().take(max_chars).collect::<String>();
    if flattened.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}
