//! The dispatch table mapping each [`NodeKind`] to its handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::builtin::{
    DelayNode, FilterNode, IfNode, LoopNode, SwitchNode, TransformNode, TriggerNode,
};
use crate::{NodeCategory, NodeHandler, NodeKind};

/// Maps node kinds to shared `NodeHandler` implementations.
///
/// Built once before any run starts. Looking up a kind with no entry yields
/// `None`; the engine turns that into an "unknown node type" failure.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    handlers: HashMap<NodeKind, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every built-in handler.
    ///
    /// `http`, `email` (action) and `database` are left unregistered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        let trigger: Arc<dyn NodeHandler> = Arc::new(TriggerNode);
        for kind in [
            NodeKind::ManualTrigger,
            NodeKind::WebhookTrigger,
            NodeKind::ScheduleTrigger,
            NodeKind::EmailTrigger,
        ] {
            registry.handlers.insert(kind, Arc::clone(&trigger));
        }
        registry.register(NodeKind::Transform, Arc::new(TransformNode));
        registry.register(NodeKind::Delay, Arc::new(DelayNode));
        registry.register(NodeKind::If, Arc::new(IfNode));
        registry.register(NodeKind::Switch, Arc::new(SwitchNode));
        registry.register(NodeKind::Loop, Arc::new(LoopNode));
        registry.register(NodeKind::Filter, Arc::new(FilterNode));
        registry
    }

    /// Install `handler` for `kind`, returning the handler it replaced.
    pub fn register(
        &mut self,
        kind: NodeKind,
        handler: Arc<dyn NodeHandler>,
    ) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.insert(kind, handler)
    }

    pub fn get(&self, kind: NodeKind) -> Option<&Arc<dyn NodeHandler>> {
        self.handlers.get(&kind)
    }

    /// Resolve a raw (category, subtype) pair to its kind and handler.
    pub fn resolve(
        &self,
        category: NodeCategory,
        subtype: &str,
    ) -> Option<(NodeKind, &Arc<dyn NodeHandler>)> {
        let kind = NodeKind::resolve(category, subtype)?;
        self.get(kind).map(|handler| (kind, handler))
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        kinds.sort();
        f.debug_struct("NodeRegistry").field("kinds", &kinds).finish()
    }
}
