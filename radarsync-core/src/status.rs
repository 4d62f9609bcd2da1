//! Human-readable status messages collected during a pass.
//!
//! Messages are deduplicated and keep their first-seen order. Sinks decide
//! where they end up; the log itself never blocks on I/O.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusLevel::Info => "INFO",
            StatusLevel::Warn => "WARN",
            StatusLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub level: StatusLevel,
    pub message: String,
}

impl StatusEvent {
    pub fn line(&self) -> String {
        format!("[{}] {}", self.level, self.message)
    }
}

#[derive(Debug, Default)]
struct StatusState {
    events: Vec<StatusEvent>,
    seen: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct StatusLog {
    state: Mutex<StatusState>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the message was already recorded.
    pub fn record(&self, level: StatusLevel, message: impl Into<String>) -> bool {
        let message = message.into();
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if !state.seen.insert(message.clone()) {
            return false;
        }
        state.events.push(StatusEvent { level, message });
        true
    }

    pub fn info(&self, message: impl Into<String>) -> bool {
        self.record(StatusLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> bool {
        self.record(StatusLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.record(StatusLevel::Error, message)
    }

    pub fn events(&self) -> Vec<StatusEvent> {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .events
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .events
            .is_empty()
    }

    pub async fn flush(&self, sink: &dyn StatusSink) -> Result<()> {
        let events = self.events();
        if events.is_empty() {
            return Ok(());
        }
        sink.publish(&events).await
    }
}

/// Destination for a pass's status events.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn publish(&self, events: &[StatusEvent]) -> Result<()>;
}

/// Emits each event through `tracing` under the `radarsync::status` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatusSink;

#[async_trait]
impl StatusSink for TracingStatusSink {
    async fn publish(&self, events: &[StatusEvent]) -> Result<()> {
        for event in events {
            match event.level {
                StatusLevel::Info => {
                    info!(target: "radarsync::status", "{}", event.message)
                }
                StatusLevel::Warn => {
                    warn!(target: "radarsync::status", "{}", event.message)
                }
                StatusLevel::Error => {
                    error!(target: "radarsync::status", "{}", event.message)
                }
            }
        }
        Ok(())
    }
}

/// Append-only text file. Lines already present are not written again, so
/// repeated passes hitting the same problem leave one entry.
#[derive(Debug, Clone)]
pub struct FileStatusSink {
    path: PathBuf,
}

impl FileStatusSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn existing_lines(&self) -> Result<HashSet<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(HashSet::new())
            }
            Err(err) => Err(SyncError::io_at(&self.path, err)),
        }
    }
}

#[async_trait]
impl StatusSink for FileStatusSink {
    async fn publish(&self, events: &[StatusEvent]) -> Result<()> {
        let existing = self.existing_lines().await?;
        let mut pending = String::new();
        for event in events {
            let line = event.line();
            if !existing.contains(&line) {
                pending.push_str(&line);
                pending.push('\n');
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| SyncError::io_at(parent, err))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| SyncError::io_at(&self.path, err))?;
        file.write_all(pending.as_bytes())
            .await
            .map_err(|err| SyncError::io_at(&self.path, err))?;
        file.flush()
            .await
            .map_err(|err| SyncError::io_at(&self.path, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn duplicate_messages_are_recorded_once() {
        let log = StatusLog::new();
        assert!(log.warn("fetch of TAMU_20240101_0000 failed"));
        assert!(!log.warn("fetch of TAMU_20240101_0000 failed"));
        assert!(log.info("staged 1 scan"));
        let messages: Vec<String> =
            log.events().into_iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec!["fetch of TAMU_20240101_0000 failed", "staged 1 scan"]
        );
    }

    #[tokio::test]
    async fn file_sink_skips_lines_already_written() {
        let dir = tempdir().unwrap();
        let sink = FileStatusSink::new(dir.path().join("status/radarsync.log"));

        let first = StatusLog::new();
        first.error("render of TAMU_20240101_0000 failed: exit 1");
        first.flush(&sink).await.unwrap();

        let second = StatusLog::new();
        second.error("render of TAMU_20240101_0000 failed: exit 1");
        second.info("rendered 2 scans");
        second.flush(&sink).await.unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(
            contents,
            "[ERROR] render of TAMU_20240101_0000 failed: exit 1\n[INFO] rendered 2 scans\n"
        );
    }
}
