//! Node categories and the closed set of (category, subtype) pairs.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NodeCategory
// ---------------------------------------------------------------------------

/// Broad family a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Starts a workflow run.
    Trigger,
    /// Performs a unit of work.
    Action,
    /// Routes, filters or reshapes data between other nodes.
    Logic,
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trigger => write!(f, "trigger"),
            Self::Action => write!(f, "action"),
            Self::Logic => write!(f, "logic"),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Every (category, subtype) pair the engine knows how to dispatch.
///
/// Resolved once per node from the workflow definition; a pair that does not
/// map onto a variant is an unknown node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    ManualTrigger,
    WebhookTrigger,
    ScheduleTrigger,
    EmailTrigger,
    Http,
    Email,
    Database,
    Transform,
    Delay,
    If,
    Switch,
    Loop,
    Filter,
}

impl NodeKind {
    pub const ALL: [NodeKind; 13] = [
        Self::ManualTrigger,
        Self::WebhookTrigger,
        Self::ScheduleTrigger,
        Self::EmailTrigger,
        Self::Http,
        Self::Email,
        Self::Database,
        Self::Transform,
        Self::Delay,
        Self::If,
        Self::Switch,
        Self::Loop,
        Self::Filter,
    ];

    /// Look up the kind for a category and subtype string.
    pub fn resolve(category: NodeCategory, subtype: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.category() == category && kind.subtype() == subtype)
    }

    pub fn category(self) -> NodeCategory {
        match self {
            Self::ManualTrigger | Self::WebhookTrigger | Self::ScheduleTrigger | Self::EmailTrigger => {
                NodeCategory::Trigger
            }
            Self::Http | Self::Email | Self::Database | Self::Transform | Self::Delay => {
                NodeCategory::Action
            }
            Self::If | Self::Switch | Self::Loop | Self::Filter => NodeCategory::Logic,
        }
    }

    pub fn subtype(self) -> &'static str {
        match self {
            Self::ManualTrigger => "manual",
            Self::WebhookTrigger => "webhook",
            Self::ScheduleTrigger => "schedule",
            Self::EmailTrigger | Self::Email => "email",
            Self::Http => "http",
            Self::Database => "database",
            Self::Transform => "transform",
            Self::Delay => "delay",
            Self::If => "if",
            Self::Switch => "switch",
            Self::Loop => "loop",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category(), self.subtype())
    }
}
