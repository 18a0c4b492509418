//! Trigger nodes (`manual`, `webhook`, `schedule`, `email`).
//!
//! The event source itself (HTTP listener, cron scheduler, mailbox poller)
//! sits outside the engine. Inside a run a trigger simply emits the payload
//! it was configured or fired with.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{ExecutionContext, NodeError, NodeHandler};

#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerNode;

#[async_trait]
impl NodeHandler for TriggerNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        Ok(ctx
            .config
            .get("payload")
            .filter(|p| !p.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())))
    }
}
