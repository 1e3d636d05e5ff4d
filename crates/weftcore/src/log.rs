use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub type ExecutionId = Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line written by a node during a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub node_id: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log buffer owned by a single execution.
pub type LogBuffer = Arc<Mutex<Vec<LogEntry>>>;

/// Logger handed to nodes through their context.
///
/// Entries are appended to the run's log buffer and mirrored to `tracing`.
#[derive(Clone)]
pub struct NodeLogger {
    execution_id: ExecutionId,
    node_id: String,
    buffer: LogBuffer,
}

impl NodeLogger {
    pub fn new(execution_id: ExecutionId, node_id: impl Into<String>, buffer: LogBuffer) -> Self {
        Self {
            execution_id,
            node_id: node_id.into(),
            buffer,
        }
    }

    /// Logger backed by a fresh buffer, for running a node outside an executor.
    pub fn detached(node_id: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4(), node_id, LogBuffer::default())
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(execution_id = %self.execution_id, node_id = %self.node_id, "{}", message),
            LogLevel::Info => tracing::info!(execution_id = %self.execution_id, node_id = %self.node_id, "{}", message),
            LogLevel::Warn => tracing::warn!(execution_id = %self.execution_id, node_id = %self.node_id, "{}", message),
            LogLevel::Error => tracing::error!(execution_id = %self.execution_id, node_id = %self.node_id, "{}", message),
        }

        let entry = LogEntry {
            node_id: self.node_id.clone(),
            level,
            message,
            timestamp: Utc::now(),
        };
        if let Ok(mut entries) = self.buffer.lock() {
            entries.push(entry);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Entries this logger's node has written so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.node_id == self.node_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
