//! Timeout, retry and failure-absorption around a single node invocation.

use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use nodes::rules::validate_config;
use nodes::{ExecutionContext, NodeError, NodeHandler, NodeRegistry};

use crate::config::EngineConfig;
use crate::models::Node;
use crate::run::{LogLevel, Run};
use crate::EngineError;

/// Marker output substituted for a node whose failure was absorbed by
/// `continue_on_fail`.
pub fn failure_sentinel(message: &str) -> Value {
    json!({ "failed": true, "error": message })
}

pub fn is_failure_sentinel(value: &Value) -> bool {
    value.get("failed").and_then(Value::as_bool) == Some(true) && value.get("error").is_some()
}

/// Wraps node dispatch with validation and the node's retry policy.
pub struct ResilientInvoker<'a> {
    registry: &'a NodeRegistry,
    config: &'a EngineConfig,
}

impl<'a> ResilientInvoker<'a> {
    pub fn new(registry: &'a NodeRegistry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Validate `node`, then run it until it succeeds or its attempts run
    /// out.
    ///
    /// Unknown types, invalid configuration and cancellation fail
    /// immediately. Failures and timeouts are retried with a fixed delay;
    /// once exhausted they are either returned or, with `continue_on_fail`,
    /// replaced by [`failure_sentinel`].
    #[instrument(skip_all, fields(run_id = %run.id, node_id = %node.id))]
    pub async fn invoke(
        &self,
        run: &mut Run,
        node: &Node,
        input: Value,
        predecessors: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<Value, EngineError> {
        let node_id = node.id.as_str();

        let Some((kind, handler)) = self.registry.resolve(node.category, &node.subtype) else {
            run.log(
                LogLevel::Error,
                Some(node_id),
                format!("Unknown node type '{}/{}'", node.category, node.subtype),
                None,
            );
            return Err(EngineError::UnknownNodeType {
                node_id: node.id.clone(),
                category: node.category,
                subtype: node.subtype.clone(),
            });
        };

        let mut violations = validate_config(kind, &node.config);
        violations.extend(handler.validate(&node.config));
        if !violations.is_empty() {
            run.log(
                LogLevel::Error,
                Some(node_id),
                format!("Configuration validation failed: {}", violations.join("; ")),
                Some(json!({ "violations": violations })),
            );
            return Err(EngineError::InvalidConfig {
                node_id: node.id.clone(),
                violations,
            });
        }

        let settings = self.config.resolve(&node.settings);
        let attempts = settings.attempts();
        let ctx = ExecutionContext {
            node_id: node.id.clone(),
            workflow_id: run.workflow_id.clone(),
            run_id: run.id,
            config: node.config.clone(),
            input,
            predecessors,
            cancel: cancel.clone(),
        };

        let mut attempt = 1;
        let failure = loop {
            let err = match run_attempt(handler.as_ref(), &ctx, settings.timeout, cancel).await {
                Ok(output) => return Ok(output),
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(err) if !err.is_retryable() => {
                    let message = failure_message(&err);
                    run.log(
                        LogLevel::Error,
                        Some(node_id),
                        format!("Attempt {attempt}/{attempts} failed: {message}"),
                        Some(json!({ "attempt": attempt, "attempts": attempts, "error": message })),
                    );
                    return Err(err);
                }
                Err(err) => err,
            };

            let message = failure_message(&err);
            let data = Some(json!({ "attempt": attempt, "attempts": attempts, "error": message }));

            if attempt >= attempts {
                run.log(
                    LogLevel::Error,
                    Some(node_id),
                    format!("Attempt {attempt}/{attempts} failed: {message}"),
                    data,
                );
                break err;
            }

            run.log(
                LogLevel::Warning,
                Some(node_id),
                format!("Attempt {attempt}/{attempts} failed: {message}"),
                data,
            );
            if !settings.retry_delay.is_zero() {
                debug!(delay = ?settings.retry_delay, "waiting before retry");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    _ = tokio::time::sleep(settings.retry_delay) => {}
                }
            }
            attempt += 1;
        };

        if settings.continue_on_fail {
            let message = failure_message(&failure);
            let sentinel = failure_sentinel(&message);
            run.log(
                LogLevel::Warning,
                Some(node_id),
                format!("Continuing after failure: {message}"),
                Some(sentinel.clone()),
            );
            return Ok(sentinel);
        }

        Err(failure)
    }
}

/// One attempt: the node races its timeout and the run-level stop signal.
///
/// A node that reports cancellation without a stop request fails with
/// [`EngineError::NodeCancelled`], which is never retried.
///
/// The attempt gets its own child token, cancelled when the attempt ends for
/// any reason, so cooperative nodes see a timeout as cancellation.
async fn run_attempt(
    handler: &dyn NodeHandler,
    base: &ExecutionContext,
    timeout: Duration,
    run_cancel: &CancellationToken,
) -> Result<Value, EngineError> {
    let attempt_token = run_cancel.child_token();
    let _scope = attempt_token.clone().drop_guard();
    let ctx = ExecutionContext {
        cancel: attempt_token,
        ..base.clone()
    };

    let outcome = tokio::select! {
        biased;
        _ = run_cancel.cancelled() => return Err(EngineError::Cancelled),
        outcome = tokio::time::timeout(timeout, handler.execute(&ctx)) => outcome,
    };

    match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(NodeError::Failed(message))) => Err(EngineError::NodeFailed {
            node_id: ctx.node_id.clone(),
            message,
        }),
        Ok(Err(NodeError::Cancelled)) if run_cancel.is_cancelled() => Err(EngineError::Cancelled),
        Ok(Err(NodeError::Cancelled)) => Err(EngineError::NodeCancelled {
            node_id: ctx.node_id.clone(),
        }),
        Err(_elapsed) => Err(EngineError::Timeout {
            node_id: ctx.node_id.clone(),
            timeout,
        }),
    }
}

fn failure_message(err: &EngineError) -> String {
    match err {
        EngineError::NodeFailed { message, .. } => message.clone(),
        EngineError::Timeout { timeout, .. } => format!("timed out after {}ms", timeout.as_millis()),
        EngineError::NodeCancelled { .. } => "cancelled by the node".to_owned(),
        other => other.to_string(),
    }
}
