//! Input resolution and branch routing between nodes.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::models::{Edge, Node, Workflow};

/// The output a node sees as its input.
///
/// Only the first incoming edge in listed order counts: a node with several
/// predecessors sees that one source's output, never a merge. When the
/// source has not produced output yet the input is an empty object.
pub fn previous_output(workflow: &Workflow, outputs: &BTreeMap<String, Value>, node_id: &str) -> Value {
    workflow
        .incoming(node_id)
        .next()
        .and_then(|edge| outputs.get(&edge.source))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// IDs of every node with an edge into `node_id`, in listed order.
pub fn predecessors(workflow: &Workflow, node_id: &str) -> Vec<String> {
    workflow
        .incoming(node_id)
        .map(|edge| edge.source.clone())
        .collect()
}

/// The branch label a branching node's output selects.
///
/// An explicit string `branch` wins; otherwise a boolean `condition` maps to
/// `"true"` / `"false"`.
pub fn branch_discriminator(output: &Value) -> Option<String> {
    if let Some(branch) = output.get("branch").and_then(Value::as_str) {
        return Some(branch.to_owned());
    }
    output
        .get("condition")
        .and_then(Value::as_bool)
        .map(|flag| flag.to_string())
}

/// Whether traversal should follow `edge` out of `node` given its output.
///
/// Edges without a branch label are always followed, as is every edge out
/// of a non-branching node.
pub fn follows(node: &Node, edge: &Edge, discriminator: Option<&str>) -> bool {
    if !node.is_branching() {
        return true;
    }
    match edge.branch.as_deref() {
        None => true,
        Some(branch) => discriminator == Some(branch),
    }
}
