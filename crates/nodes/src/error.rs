//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Failed`: counted as a failed attempt; retried while attempts remain.
/// - `Cancelled`: the node observed its cancellation signal; never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The node's operation failed.
    #[error("{0}")]
    Failed(String),

    /// The node stopped because its cancellation token fired.
    #[error("node execution cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
