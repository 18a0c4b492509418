//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory. They round-trip through JSON so workflow files can be fed to
//! the engine directly. A workflow is never mutated by a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use nodes::NodeCategory;

// ---------------------------------------------------------------------------
// NodeSettings
// ---------------------------------------------------------------------------

/// Per-node run settings. Unset fields fall back to
/// [`EngineConfig`](crate::EngineConfig) defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Per-attempt timeout in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Extra attempts after the first failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    /// Fixed wait between attempts in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    /// Substitute a failure marker instead of failing the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_on_fail: Option<bool>,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    pub category: NodeCategory,
    /// Node family within the category, e.g. `http` or `if`.
    pub subtype: String,
    /// Arbitrary configuration passed to the node at execution time.
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub settings: NodeSettings,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        category: NodeCategory,
        subtype: impl Into<String>,
        config: Value,
    ) -> Self {
        Self {
            id: id.into(),
            category,
            subtype: subtype.into(),
            config,
            settings: NodeSettings::default(),
        }
    }

    pub fn trigger(id: impl Into<String>, subtype: impl Into<String>, config: Value) -> Self {
        Self::new(id, NodeCategory::Trigger, subtype, config)
    }

    pub fn action(id: impl Into<String>, subtype: impl Into<String>, config: Value) -> Self {
        Self::new(id, NodeCategory::Action, subtype, config)
    }

    pub fn logic(id: impl Into<String>, subtype: impl Into<String>, config: Value) -> Self {
        Self::new(id, NodeCategory::Logic, subtype, config)
    }

    pub fn with_settings(mut self, settings: NodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }

    /// Whether this node's output selects among branch-handled edges.
    pub fn is_branching(&self) -> bool {
        self.category == NodeCategory::Logic && self.subtype == "if"
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Branch label; only meaningful on edges leaving an `if` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            branch: None,
        }
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes,
            edges,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Trigger nodes in listed order.
    pub fn triggers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_trigger())
    }

    /// Edges leaving `node_id`, in listed order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Edges entering `node_id`, in listed order.
    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }
}
