//! `delay` action: waits `duration_ms`, then passes its input through.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{ExecutionContext, NodeError, NodeHandler};

#[derive(Debug, Default, Clone, Copy)]
pub struct DelayNode;

#[async_trait]
impl NodeHandler for DelayNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let millis = ctx
            .config
            .get("duration_ms")
            .and_then(Value::as_u64)
            .ok_or_else(|| NodeError::failed("'duration_ms' must be a non-negative integer"))?;

        tokio::select! {
            _ = ctx.cancel.cancelled() => Err(NodeError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(ctx.input.clone()),
        }
    }
}
