//! The execution record of one run: status, ordered log and node outputs.
//!
//! A `Run` is owned by the `execute` call that created it and is threaded
//! through every step by `&mut`, so the log and output map never need
//! locking.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// `None` for run-level entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// A single `execute` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub workflow_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Append-only, in emission order.
    pub log: Vec<LogEntry>,
    /// Last recorded output per node.
    pub outputs: BTreeMap<String, Value>,
}

impl Run {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            log: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Append a log entry and mirror it to `tracing`.
    pub fn log(
        &mut self,
        level: LogLevel,
        node_id: Option<&str>,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let message = message.into();
        match level {
            LogLevel::Info => info!(run_id = %self.id, node_id, "{message}"),
            LogLevel::Warning => warn!(run_id = %self.id, node_id, "{message}"),
            LogLevel::Error => error!(run_id = %self.id, node_id, "{message}"),
        }
        self.log.push(LogEntry {
            timestamp: Utc::now(),
            node_id: node_id.map(str::to_owned),
            level,
            message,
            data,
        });
    }

    /// Store a node's output, replacing any earlier output from the same
    /// node.
    pub fn record_output(&mut self, node_id: &str, output: Value) {
        self.outputs.insert(node_id.to_owned(), output);
    }

    pub fn output(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    /// Entries emitted for one node, in order.
    pub fn entries_for<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.log
            .iter()
            .filter(move |e| e.node_id.as_deref() == Some(node_id))
    }

    /// Move to a terminal status. Only the first call has any effect;
    /// returns whether this call was it.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
        true
    }
}
