//! The `NodeHandler` trait: the contract every node family must fulfil.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::NodeError;

/// Per-invocation context passed to a node.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the node being executed.
    pub node_id: String,
    /// ID of the parent workflow.
    pub workflow_id: String,
    /// ID of the current run.
    pub run_id: Uuid,
    /// The node's configuration, already validated.
    pub config: Value,
    /// Output of the upstream node visible to this node.
    pub input: Value,
    /// IDs of every node with an edge into this one.
    pub predecessors: Vec<String>,
    /// Fires when the run is stopped or this attempt times out.
    pub cancel: CancellationToken,
}

/// The core node trait.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    /// Extra configuration checks beyond the built-in rule set for the
    /// node's subtype. Returns one message per violated rule.
    fn validate(&self, _config: &Value) -> Vec<String> {
        Vec::new()
    }

    /// Execute the node and return its JSON output.
    ///
    /// Long-running work must watch `ctx.cancel` and return
    /// [`NodeError::Cancelled`] once it fires.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError>;
}
