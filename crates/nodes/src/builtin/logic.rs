//! Logic nodes: `if`, `switch`, `filter` and `loop`.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::condition::{loosely_equal, lookup, ConditionSet};
use crate::{ExecutionContext, NodeError, NodeHandler};

/// Evaluates its conditions against the input and reports which branch to
/// take: `{ "condition": bool, "branch": "true" | "false", "data": input }`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IfNode;

#[async_trait]
impl NodeHandler for IfNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let set = ConditionSet::from_config(&ctx.config)?;
        let condition = set.matches(&ctx.input);
        tracing::debug!(node_id = %ctx.node_id, condition, "if evaluated");
        Ok(json!({
            "condition": condition,
            "branch": if condition { "true" } else { "false" },
            "data": ctx.input,
        }))
    }
}

/// Picks the label of the first case whose `value` matches the input field,
/// falling back to `default` (or the literal `"default"`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SwitchNode;

#[async_trait]
impl NodeHandler for SwitchNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let field = ctx
            .config
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::failed("'field' must be a string"))?;
        let cases = ctx
            .config
            .get("cases")
            .and_then(Value::as_array)
            .ok_or_else(|| NodeError::failed("'cases' must be an array"))?;

        let actual = lookup(&ctx.input, field);
        let matched = cases.iter().find_map(|case| {
            let expected = case.get("value")?;
            let hit = actual.is_some_and(|a| loosely_equal(a, expected));
            hit.then(|| case.get("label").and_then(Value::as_str)).flatten()
        });
        let branch = matched
            .or_else(|| ctx.config.get("default").and_then(Value::as_str))
            .unwrap_or("default");

        Ok(json!({ "branch": branch, "data": ctx.input }))
    }
}

/// Keeps the items of an array that satisfy the conditions.
///
/// The array is taken from `field` when configured, otherwise from the input
/// itself or its `items` key.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterNode;

#[async_trait]
impl NodeHandler for FilterNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let set = ConditionSet::from_config(&ctx.config)?;
        let items = source_array(ctx)?;
        let kept: Vec<Value> = items
            .iter()
            .filter(|item| set.matches(item))
            .cloned()
            .collect();
        let count = kept.len();
        Ok(json!({ "count": count, "items": kept }))
    }
}

fn source_array(ctx: &ExecutionContext) -> Result<&Vec<Value>, NodeError> {
    let source = match ctx.config.get("field").and_then(Value::as_str) {
        Some(field) => lookup(&ctx.input, field),
        None if ctx.input.is_array() => Some(&ctx.input),
        None => ctx.input.get("items"),
    };
    source
        .and_then(Value::as_array)
        .ok_or_else(|| NodeError::failed("filter input is not an array"))
}

/// Expands the array at `field` into indexed items for downstream nodes.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoopNode;

#[async_trait]
impl NodeHandler for LoopNode {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        let field = ctx
            .config
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::failed("'field' must be a string"))?;
        let items = lookup(&ctx.input, field)
            .and_then(Value::as_array)
            .ok_or_else(|| NodeError::failed(format!("'{field}' is not an array in the input")))?;

        let indexed: Vec<Value> = items
            .iter()
            .enumerate()
            .map(|(index, item)| json!({ "index": index, "item": item }))
            .collect();
        let count = indexed.len();
        Ok(json!({ "count": count, "items": indexed }))
    }
}
