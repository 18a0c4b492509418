//! `transform` action: builds a new object from literals and input paths.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::condition::lookup;
use crate::{ExecutionContext, NodeError, NodeHandler};

/// Config:
/// - `set`: object of literal values copied into the output.
/// - `mappings`: `[{ "from": "dotted.input.path", "to": "key" }]`; missing
///   source paths map to `null`.
/// - `keep_input`: start from the input object instead of an empty one.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformNode;

#[async_trait]
impl NodeHandler for TransformNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let keep_input = ctx
            .config
            .get("keep_input")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut out = match (&ctx.input, keep_input) {
            (Value::Object(input), true) => input.clone(),
            _ => Map::new(),
        };

        if let Some(set) = ctx.config.get("set").and_then(Value::as_object) {
            for (key, value) in set {
                out.insert(key.clone(), value.clone());
            }
        }

        if let Some(mappings) = ctx.config.get("mappings").and_then(Value::as_array) {
            for mapping in mappings {
                let (Some(from), Some(to)) = (
                    mapping.get("from").and_then(Value::as_str),
                    mapping.get("to").and_then(Value::as_str),
                ) else {
                    return Err(NodeError::failed(format!("malformed mapping: {mapping}")));
                };
                let value = lookup(&ctx.input, from).cloned().unwrap_or(Value::Null);
                out.insert(to.to_owned(), value);
            }
        }

        Ok(Value::Object(out))
    }
}
