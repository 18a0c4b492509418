//! Engine-level error types.

use std::time::Duration;

use thiserror::Error;

use nodes::NodeCategory;

/// Errors produced by the workflow engine (graph checks + execution).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    // ------ Graph errors ------

    /// The requested start node is not part of the workflow.
    #[error("start node not found: '{0}'")]
    StartNodeNotFound(String),

    /// No start node was given and the workflow has no trigger.
    #[error("no trigger nodes found")]
    NoTriggerNodes,

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge '{edge_id}' references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        edge_id: String,
        node_id: String,
        side: &'static str,
    },

    /// The graph contains a cycle through the named node.
    #[error("workflow graph contains a cycle through node '{0}'")]
    CycleDetected(String),

    // ------ Node errors ------

    /// The (category, subtype) pair has no registered handler.
    #[error("unknown node type '{category}/{subtype}' for node '{node_id}'")]
    UnknownNodeType {
        node_id: String,
        category: NodeCategory,
        subtype: String,
    },

    /// The node's configuration violates its rule set.
    #[error("node '{node_id}' has invalid configuration: {}", .violations.join("; "))]
    InvalidConfig {
        node_id: String,
        violations: Vec<String>,
    },

    /// The node failed on every attempt.
    #[error("node '{node_id}' failed: {message}")]
    NodeFailed { node_id: String, message: String },

    /// The node's last attempt ran past its timeout.
    #[error("node '{node_id}' timed out after {}ms", .timeout.as_millis())]
    Timeout { node_id: String, timeout: Duration },

    /// A node reported cancellation while the run itself was still live.
    #[error("node '{node_id}' cancelled its own execution")]
    NodeCancelled { node_id: String },

    /// The run was stopped.
    #[error("workflow execution cancelled")]
    Cancelled,
}

impl EngineError {
    /// Failures the retry policy applies to. Everything else fails closed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NodeFailed { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_execution_failures_are_retryable() {
        assert!(EngineError::NodeFailed {
            node_id: "n".into(),
            message: "boom".into()
        }
        .is_retryable());
        assert!(EngineError::Timeout {
            node_id: "n".into(),
            timeout: Duration::from_secs(1)
        }
        .is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
        assert!(!EngineError::NodeCancelled { node_id: "n".into() }.is_retryable());
        assert!(!EngineError::InvalidConfig {
            node_id: "n".into(),
            violations: vec![]
        }
        .is_retryable());
    }

    #[test]
    fn invalid_config_lists_every_violation() {
        let err = EngineError::InvalidConfig {
            node_id: "h".into(),
            violations: vec!["'url' is required".into(), "'method' must be one of: GET".into()],
        };
        assert_eq!(
            err.to_string(),
            "node 'h' has invalid configuration: 'url' is required; 'method' must be one of: GET"
        );
    }
}
