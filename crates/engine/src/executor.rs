//! Workflow execution engine.
//!
//! `WorkflowEngine` is the central orchestrator:
//! 1. Validates the graph (unique ids, known edge endpoints, no cycles).
//! 2. Resolves the entry points: every trigger in listed order, or a single
//!    caller-chosen start node.
//! 3. Walks each entry point depth-first, one node at a time, invoking every
//!    node through [`ResilientInvoker`].
//! 4. Skips edges out of `if` nodes whose branch label was not selected.
//! 5. Finalizes the [`Run`] as completed, failed or cancelled.

use std::sync::{Mutex, PoisonError};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use nodes::rules::validate_config;
use nodes::NodeRegistry;

use crate::config::EngineConfig;
use crate::dag::validate_dag;
use crate::models::{Node, Workflow};
use crate::resilience::ResilientInvoker;
use crate::routing;
use crate::run::{LogLevel, Run, RunStatus};
use crate::EngineError;

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

/// Runs workflows against a fixed node registry.
///
/// Share one engine behind an `Arc` when [`WorkflowEngine::stop`] needs to
/// be called from another task while [`WorkflowEngine::execute`] is in
/// flight.
pub struct WorkflowEngine {
    registry: NodeRegistry,
    config: EngineConfig,
    /// Cancellation token of the most recently started run.
    current: Mutex<CancellationToken>,
}

impl WorkflowEngine {
    /// Create a new engine.
    pub fn new(registry: NodeRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            config,
            current: Mutex::new(CancellationToken::new()),
        }
    }

    /// An engine with every built-in node and default settings.
    pub fn with_builtins() -> Self {
        Self::new(NodeRegistry::with_builtins(), EngineConfig::default())
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `workflow` to completion and return its execution record.
    ///
    /// With `start_node_id` only that node's subgraph runs; otherwise every
    /// trigger's subgraph runs, one after another in listed order. Failures
    /// never surface as `Err`: they are reflected in the run's status, error
    /// and log.
    #[instrument(skip(self, workflow), fields(workflow_id = %workflow.id))]
    pub async fn execute(&self, workflow: &Workflow, start_node_id: Option<&str>) -> Run {
        let cancel = CancellationToken::new();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = cancel.clone();

        let mut run = Run::new(workflow.id.clone());
        let run_id = run.id;
        run.log(
            LogLevel::Info,
            None,
            format!("Workflow '{}' execution started", workflow.name),
            Some(json!({ "workflow_id": workflow.id, "run_id": run_id })),
        );

        let outcome = self.walk(workflow, start_node_id, &mut run, &cancel).await;
        finalize(&mut run, outcome, &cancel);
        run
    }

    /// Cancel the in-flight run.
    ///
    /// Nodes not yet reached are never visited and the running node's
    /// attempt is abandoned; the run ends as [`RunStatus::Cancelled`].
    ///
    /// Only the most recently started run is targeted. When several
    /// `execute` calls overlap on one shared engine, earlier runs can no
    /// longer be stopped through this handle.
    pub fn stop(&self) {
        info!("stop requested");
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Check the graph and every node configuration without running
    /// anything.
    ///
    /// # Errors
    /// Every problem found: a graph error, unknown node types and invalid
    /// configurations.
    pub fn validate(&self, workflow: &Workflow) -> Result<(), Vec<EngineError>> {
        let mut errors = Vec::new();
        if let Err(err) = validate_dag(workflow) {
            errors.push(err);
        }

        for node in &workflow.nodes {
            let Some((kind, handler)) = self.registry.resolve(node.category, &node.subtype) else {
                errors.push(EngineError::UnknownNodeType {
                    node_id: node.id.clone(),
                    category: node.category,
                    subtype: node.subtype.clone(),
                });
                continue;
            };
            let mut violations = validate_config(kind, &node.config);
            violations.extend(handler.validate(&node.config));
            if !violations.is_empty() {
                errors.push(EngineError::InvalidConfig {
                    node_id: node.id.clone(),
                    violations,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    async fn walk(
        &self,
        workflow: &Workflow,
        start_node_id: Option<&str>,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        validate_dag(workflow)?;

        let entries: Vec<&Node> = match start_node_id {
            Some(id) => {
                let node = workflow
                    .node(id)
                    .ok_or_else(|| EngineError::StartNodeNotFound(id.to_owned()))?;
                vec![node]
            }
            None => {
                let triggers: Vec<&Node> = workflow.triggers().collect();
                if triggers.is_empty() {
                    return Err(EngineError::NoTriggerNodes);
                }
                triggers
            }
        };

        for entry in entries {
            self.descend(workflow, entry, run, cancel).await?;
        }
        Ok(())
    }

    /// Depth-first walk from `entry`.
    ///
    /// Uses an explicit stack; children are pushed in reverse so they are
    /// visited in listed edge order, each subtree finishing before the next
    /// sibling starts.
    async fn descend(
        &self,
        workflow: &Workflow,
        entry: &Node,
        run: &mut Run,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let invoker = ResilientInvoker::new(&self.registry, &self.config);
        let mut stack: Vec<&Node> = vec![entry];

        while let Some(node) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            run.log(
                LogLevel::Info,
                Some(node.id.as_str()),
                format!("Executing node '{}' ({}/{})", node.id, node.category, node.subtype),
                None,
            );

            let input = routing::previous_output(workflow, &run.outputs, &node.id);
            let predecessors = routing::predecessors(workflow, &node.id);
            let output = invoker
                .invoke(run, node, input, predecessors, cancel)
                .await?;

            run.record_output(&node.id, output.clone());
            run.log(
                LogLevel::Info,
                Some(node.id.as_str()),
                format!("Node '{}' completed", node.id),
                Some(output.clone()),
            );

            let discriminator = node
                .is_branching()
                .then(|| routing::branch_discriminator(&output))
                .flatten();

            let mut next = Vec::new();
            for edge in workflow.outgoing(&node.id) {
                if !routing::follows(node, edge, discriminator.as_deref()) {
                    tracing::debug!(edge_id = %edge.id, target = %edge.target, "branch not taken");
                    continue;
                }
                let target = workflow.node(&edge.target).ok_or_else(|| {
                    EngineError::UnknownNodeReference {
                        edge_id: edge.id.clone(),
                        node_id: edge.target.clone(),
                        side: "target",
                    }
                })?;
                next.push(target);
            }
            stack.extend(next.into_iter().rev());
        }

        Ok(())
    }
}

/// Move the run to its terminal status. A stop request wins over any other
/// outcome.
fn finalize(run: &mut Run, outcome: Result<(), EngineError>, cancel: &CancellationToken) {
    if cancel.is_cancelled() || matches!(outcome, Err(EngineError::Cancelled)) {
        run.log(LogLevel::Warning, None, "Workflow execution cancelled", None);
        let error = outcome.err().map(|err| err.to_string());
        run.finish(RunStatus::Cancelled, error);
        return;
    }

    match outcome {
        Ok(()) => {
            run.log(LogLevel::Info, None, "Workflow execution completed", None);
            run.finish(RunStatus::Completed, None);
        }
        Err(err) => {
            let message = err.to_string();
            run.log(
                LogLevel::Error,
                None,
                format!("Workflow execution failed: {message}"),
                None,
            );
            run.finish(RunStatus::Failed, Some(message));
        }
    }
}
