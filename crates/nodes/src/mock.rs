//! `MockNode`: a test double for `NodeHandler`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::{ExecutionContext, NodeError, NodeHandler};

/// Behaviour injected into `MockNode` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Return whatever input the node received.
    EchoInput,
    /// Always fail with the given message.
    Fail(String),
    /// Fail the first `failures` calls, then return the value.
    FailTimes { failures: u32, then: Value },
    /// Never complete; return `Cancelled` once the context's token fires.
    HangUntilCancelled,
    /// Never complete and never look at the cancellation token.
    HangForever,
}

/// A mock node that records every call it receives and behaves as
/// programmed.
#[derive(Debug)]
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All inputs seen by this node (in call order).
    pub calls: Mutex<Vec<Value>>,
    /// Violations reported by `validate`, regardless of config.
    pub violations: Vec<String>,
    attempts: AtomicU32,
}

impl MockNode {
    pub fn new(name: impl Into<String>, behaviour: MockBehaviour) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behaviour,
            calls: Mutex::new(Vec::new()),
            violations: Vec::new(),
            attempts: AtomicU32::new(0),
        })
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Arc<Self> {
        Self::new(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always succeeds with its input.
    pub fn echo(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, MockBehaviour::EchoInput)
    }

    /// Create a mock that always fails.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Arc<Self> {
        Self::new(name, MockBehaviour::Fail(msg.into()))
    }

    /// Create a mock that fails `failures` times before succeeding.
    pub fn flaky(name: impl Into<String>, failures: u32, then: Value) -> Arc<Self> {
        Self::new(name, MockBehaviour::FailTimes { failures, then })
    }

    /// Create a mock whose `validate` always reports `violations`.
    pub fn rejecting(name: impl Into<String>, violations: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnValue(Value::Null),
            calls: Mutex::new(Vec::new()),
            violations,
            attempts: AtomicU32::new(0),
        })
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Inputs seen so far, in call order.
    pub fn inputs(&self) -> Vec<Value> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl NodeHandler for MockNode {
    fn validate(&self, _config: &Value) -> Vec<String> {
        self.violations.clone()
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ctx.input.clone());
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::EchoInput => Ok(ctx.input.clone()),
            MockBehaviour::Fail(msg) => Err(NodeError::Failed(msg.clone())),
            MockBehaviour::FailTimes { failures, then } => {
                if attempt <= *failures {
                    Err(NodeError::Failed(format!(
                        "{} failure {attempt} of {failures}",
                        self.name
                    )))
                } else {
                    Ok(then.clone())
                }
            }
            MockBehaviour::HangUntilCancelled => {
                ctx.cancel.cancelled().await;
                Err(NodeError::Cancelled)
            }
            MockBehaviour::HangForever => std::future::pending().await,
        }
    }
}
