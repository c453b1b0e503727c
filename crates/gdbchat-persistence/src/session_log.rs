//! Append-only structured session log.
//!
//! One JSON object per line:
//! `{timestamp, level, event_type, session_id, message, ...payload}`.
//! Writes are best-effort: a failing disk never fails the caller, it only
//! produces a `tracing` warning.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use gdbchat_models::SessionId;

use crate::error::{PersistenceError, Result};

/// Severity of a session log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Recoverable problem.
    Warn,
    /// Failed operation.
    Error,
}

/// One line of the session log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Machine readable event name, e.g. `chat_request`.
    #[serde(rename = "event-type")]
    pub event_type: String,
    /// Session the event belongs to.
    #[serde(rename = "session-id")]
    pub session_id: SessionId,
    /// Human readable summary.
    pub message: String,
    /// Additional fields, flattened into the line.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

fn payload_map(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

/// Writer for one session's log file.
pub struct SessionLogger {
    session_id: SessionId,
    path: PathBuf,
    executable: Option<PathBuf>,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl SessionLogger {
    /// Creates a new log file in `dir`.
    ///
    /// The file name is derived from the executable name (or `session`),
    /// the creation time and the session id.
    pub fn create(dir: impl AsRef<Path>, executable: Option<&Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| PersistenceError::DirectoryError {
            path: dir.to_path_buf(),
            source,
        })?;

        let session_id = SessionId::new();
        let stem = executable
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().replace(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_', "_"))
            .unwrap_or_else(|| "session".to_string());
        let short_id: String = session_id.as_str().chars().take(8).collect();
        let file_name = format!(
            "{}-{}-{}.jsonl",
            stem,
            Utc::now().format("%Y%m%d-%H%M%S"),
            short_id
        );
        let path = dir.join(file_name);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| PersistenceError::WriteError {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), session_id = %session_id, "session log opened");

        Ok(Self {
            session_id,
            path,
            executable: executable.map(Path::to_path_buf),
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Session identifier stamped on every line.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Executable this session is about, if any.
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Appends one event. Never fails; IO problems are reported via tracing.
    pub fn log(&self, level: LogLevel, event_type: &str, message: &str, payload: Value) {
        let event = LogEvent {
            timestamp: Utc::now(),
            level,
            event_type: event_type.to_string(),
            session_id: self.session_id.clone(),
            message: message.to_string(),
            payload: payload_map(payload),
        };

        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, event_type, "failed to serialize session log event");
                return;
            }
        };

        let mut guard = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(writer) = guard.as_mut() else {
            debug!(event_type, "session log closed, dropping event");
            return;
        };

        let result = writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to write session log");
        }
    }

    /// Logs at info level.
    pub fn info(&self, event_type: &str, message: &str, payload: Value) {
        self.log(LogLevel::Info, event_type, message, payload);
    }

    /// Logs at warn level.
    pub fn warn(&self, event_type: &str, message: &str, payload: Value) {
        self.log(LogLevel::Warn, event_type, message, payload);
    }

    /// Logs at error level.
    pub fn error(&self, event_type: &str, message: &str, payload: Value) {
        self.log(LogLevel::Error, event_type, message, payload);
    }

    /// Flushes and closes the file. Later events are dropped.
    pub fn close(&self) {
        let mut guard = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mut writer) = guard.take() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "failed to flush session log");
            }
        }
    }

    /// True once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

impl Drop for SessionLogger {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("session_id", &self.session_id)
            .field("path", &self.path)
            .finish()
    }
}

/// Holder for the single active session logger.
///
/// Rotation installs a fresh logger and closes the previous file even if
/// other tasks still hold an `Arc` to it.
pub struct SessionLogs {
    dir: PathBuf,
    current: RwLock<Arc<SessionLogger>>,
}

impl SessionLogs {
    /// Creates the holder with an initial logger not tied to an executable.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let initial = SessionLogger::create(&dir, None)?;
        Ok(Self {
            dir,
            current: RwLock::new(Arc::new(initial)),
        })
    }

    /// Directory holding the log files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The active logger.
    pub fn current(&self) -> Arc<SessionLogger> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    /// Starts a new log for `executable` and closes the previous one.
    pub fn rotate(&self, executable: &Path) -> Result<Arc<SessionLogger>> {
        let next = Arc::new(SessionLogger::create(&self.dir, Some(executable))?);
        let previous = {
            let mut guard = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *guard, Arc::clone(&next))
        };

        previous.info(
            "session_rotated",
            "session log rotated",
            serde_json::json!({ "nextSession": next.session_id() }),
        );
        previous.close();

        info!(
            executable = %executable.display(),
            session_id = %next.session_id(),
            "session log rotated"
        );
        next.info(
            "session_started",
            "new debugging session",
            serde_json::json!({ "executable": executable.display().to_string() }),
        );
        Ok(next)
    }

    /// Closes the active logger (shutdown path).
    pub fn close(&self) {
        self.current().close();
    }
}
