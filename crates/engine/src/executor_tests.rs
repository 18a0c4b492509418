//! Behaviour tests for the workflow execution engine.
//!
//! These run real `WorkflowEngine` instances against the built-in nodes plus
//! `MockNode` and recording handlers registered for the externally supplied node
//! families (`http`, `email`, `database`). Timing tests use tokio's paused
//! clock so retries and timeouts resolve instantly and deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use nodes::mock::MockNode;
use nodes::{ExecutionContext, NodeError, NodeHandler, NodeKind, NodeRegistry};

use crate::{
    failure_sentinel, Edge, EngineConfig, LogLevel, Node, NodeSettings, Run, RunStatus,
    Workflow, WorkflowEngine,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn http(id: &str) -> Node {
    Node::action(id, "http", json!({ "url": "https://api.example.com/items" }))
}

fn email(id: &str) -> Node {
    Node::action(
        id,
        "email",
        json!({ "to": "ops@example.com", "subject": "report", "body": "done" }),
    )
}

fn manual(id: &str, payload: Value) -> Node {
    Node::trigger(id, "manual", json!({ "payload": payload }))
}

fn edge(from: &str, to: &str) -> Edge {
    Edge::new(format!("{from}->{to}"), from, to)
}

fn engine_with(handlers: Vec<(NodeKind, Arc<dyn NodeHandler>)>) -> WorkflowEngine {
    let mut registry = NodeRegistry::with_builtins();
    for (kind, handler) in handlers {
        registry.register(kind, handler);
    }
    WorkflowEngine::new(registry, EngineConfig::default())
}

fn settings(retry_count: u32, retry_delay_ms: u64, continue_on_fail: bool) -> NodeSettings {
    NodeSettings {
        timeout_ms: None,
        retry_count: Some(retry_count),
        retry_delay_ms: Some(retry_delay_ms),
        continue_on_fail: Some(continue_on_fail),
    }
}

fn messages(run: &Run) -> Vec<String> {
    run.log.iter().map(|e| e.message.clone()).collect()
}

fn node_messages(run: &Run, node_id: &str) -> Vec<String> {
    run.entries_for(node_id).map(|e| e.message.clone()).collect()
}

/// Records the context of every call and returns `{ "node": <id> }`.
#[derive(Default)]
struct ContextRecorder {
    seen: Mutex<Vec<ExecutionContext>>,
}

impl ContextRecorder {
    fn visited(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|c| c.node_id.clone()).collect()
    }
}

#[async_trait]
impl NodeHandler for ContextRecorder {
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Value, NodeError> {
        self.seen.lock().unwrap().push(ctx.clone());
        Ok(json!({ "node": ctx.node_id }))
    }
}

// ============================================================
// Entry points and graph errors
// ============================================================

#[tokio::test]
async fn workflow_without_triggers_fails_immediately() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new("wf", "no triggers", vec![http("a"), http("b")], vec![edge("a", "b")]);

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap().contains("no trigger nodes found"));
    assert!(run.outputs.is_empty());
    assert!(run.completed_at.is_some());
    assert!(recorder.visited().is_empty());
}

#[tokio::test]
async fn unknown_start_node_fails_without_touching_nodes() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf",
        "start",
        vec![manual("t", json!({})), http("a")],
        vec![edge("t", "a")],
    );

    let run = engine.execute(&wf, Some("ghost")).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("start node not found: 'ghost'"));
    assert!(run.outputs.is_empty());
    assert!(run.log.iter().all(|e| e.node_id.is_none()));
    assert!(recorder.visited().is_empty());
}

#[tokio::test]
async fn cyclic_workflow_is_rejected_before_running() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf",
        "loop",
        vec![manual("t", json!({})), http("a"), http("b")],
        vec![edge("t", "a"), edge("a", "b"), edge("b", "a")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.as_deref().unwrap().contains("cycle"));
    assert!(run.outputs.is_empty());
    assert!(recorder.visited().is_empty());
}

#[tokio::test]
async fn start_node_override_runs_only_its_subgraph() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf",
        "override",
        vec![manual("t", json!({ "x": 1 })), http("a"), http("b")],
        vec![edge("t", "a"), edge("a", "b")],
    );

    let run = engine.execute(&wf, Some("a")).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(recorder.visited(), vec!["a", "b"]);
    assert!(run.output("t").is_none());
    // The trigger never ran, so `a` sees the neutral empty input.
    assert_eq!(recorder.seen.lock().unwrap()[0].input, json!({}));
}

// ============================================================
// Traversal order and data flow
// ============================================================

#[tokio::test]
async fn walk_is_depth_first_in_listed_edge_order() {
    //   t
    //  / \
    // a   b
    // |
    // c
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf",
        "dfs",
        vec![manual("t", json!({})), http("a"), http("b"), http("c")],
        vec![edge("t", "a"), edge("t", "b"), edge("a", "c")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(recorder.visited(), vec!["a", "c", "b"]);
}

#[tokio::test]
async fn triggers_run_one_after_another_in_listed_order() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf",
        "two triggers",
        vec![
            http("a1"),
            manual("t1", json!({ "from": 1 })),
            http("a2"),
            manual("t2", json!({ "from": 2 })),
            http("b2"),
        ],
        vec![edge("t2", "a2"), edge("a2", "b2"), edge("t1", "a1")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(recorder.visited(), vec!["a1", "a2", "b2"]);
    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen[0].input, json!({ "from": 1 }));
    assert_eq!(seen[1].input, json!({ "from": 2 }));
}

#[tokio::test]
async fn context_carries_ids_and_predecessors() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf-ctx",
        "ctx",
        vec![manual("t", json!({ "k": "v" })), http("a"), http("b")],
        vec![edge("t", "a"), edge("t", "b"), edge("a", "b")],
    );

    let run = engine.execute(&wf, None).await;

    let seen = recorder.seen.lock().unwrap();
    let a = &seen[0];
    assert_eq!(a.node_id, "a");
    assert_eq!(a.workflow_id, "wf-ctx");
    assert_eq!(a.run_id, run.id);
    assert_eq!(a.input, json!({ "k": "v" }));
    assert_eq!(a.config["url"], "https://api.example.com/items");

    let b = seen.iter().find(|c| c.node_id == "b").unwrap();
    assert_eq!(b.predecessors, vec!["t", "a"]);
}

#[tokio::test]
async fn reconvergent_node_keeps_last_output_and_first_edge_input() {
    //   t
    //  / \
    // b   c
    //  \ /
    //   d
    let b = MockNode::returning("b", json!({ "from": "b" }));
    let c = MockNode::returning("c", json!({ "from": "c" }));
    let d = MockNode::echo("d");
    let engine = engine_with(vec![
        (NodeKind::Http, b.clone()),
        (NodeKind::Email, c.clone()),
        (NodeKind::Database, d.clone()),
    ]);
    let wf = Workflow::new(
        "wf",
        "diamond",
        vec![
            manual("t", json!({})),
            http("b"),
            email("c"),
            Node::action("d", "database", json!({ "operation": "select", "query": "SELECT 1" })),
        ],
        vec![edge("t", "b"), edge("t", "c"), edge("b", "d"), edge("c", "d")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(d.call_count(), 2);
    // Only the first incoming edge (b -> d) feeds d, on both visits.
    assert_eq!(d.inputs(), vec![json!({ "from": "b" }), json!({ "from": "b" })]);
    assert_eq!(run.outputs.len(), 4);
    assert_eq!(run.output("d"), Some(&json!({ "from": "b" })));
    assert_eq!(
        node_messages(&run, "d")
            .iter()
            .filter(|m| m.starts_with("Executing"))
            .count(),
        2
    );
}

// ============================================================
// Branch routing
// ============================================================

fn status_workflow(status: &str) -> Workflow {
    Workflow::new(
        "wf-branch",
        "branch",
        vec![
            manual("trigger", json!({ "status": status })),
            Node::logic(
                "check",
                "if",
                json!({
                    "conditions": [{ "field": "status", "operator": "equals", "value": "active" }]
                }),
            ),
            Node::action("transform", "transform", json!({ "set": { "handled": true } })),
            Node::action("delay", "delay", json!({ "duration_ms": 0 })),
        ],
        vec![
            edge("trigger", "check"),
            edge("check", "transform").on_branch("true"),
            edge("check", "delay").on_branch("false"),
        ],
    )
}

#[tokio::test]
async fn active_status_takes_only_the_true_branch() {
    let engine = WorkflowEngine::with_builtins();

    let run = engine.execute(&status_workflow("active"), None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output("check").unwrap()["condition"], true);
    assert_eq!(run.output("transform"), Some(&json!({ "handled": true })));
    assert!(run.output("delay").is_none());
    assert_eq!(run.entries_for("delay").count(), 0);
}

#[tokio::test]
async fn inactive_status_takes_only_the_false_branch() {
    let engine = WorkflowEngine::with_builtins();

    let run = engine.execute(&status_workflow("paused"), None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output("check").unwrap()["condition"], false);
    assert_eq!(run.entries_for("transform").count(), 0);
    assert!(run.output("transform").is_none());
    assert_eq!(run.output("delay").unwrap()["data"]["status"], "paused");
}

#[tokio::test]
async fn unlabelled_edges_out_of_if_are_always_followed() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let mut wf = status_workflow("paused");
    wf.nodes.push(http("audit"));
    wf.edges.push(edge("check", "audit"));

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(recorder.visited(), vec!["audit"]);
}

#[tokio::test]
async fn branch_labels_on_non_if_nodes_are_ignored() {
    let recorder = Arc::new(ContextRecorder::default());
    let engine = engine_with(vec![(NodeKind::Http, recorder.clone())]);
    let wf = Workflow::new(
        "wf",
        "switch",
        vec![
            manual("t", json!({ "kind": "a" })),
            Node::logic(
                "sw",
                "switch",
                json!({ "field": "kind", "cases": [{ "label": "left", "value": "a" }] }),
            ),
            http("left"),
            http("right"),
        ],
        vec![
            edge("t", "sw"),
            edge("sw", "left").on_branch("left"),
            edge("sw", "right").on_branch("right"),
        ],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output("sw").unwrap()["branch"], "left");
    assert_eq!(recorder.visited(), vec!["left", "right"]);
}

// ============================================================
// Validation and dispatch
// ============================================================

#[tokio::test]
async fn invalid_config_never_reaches_the_node() {
    let mock = MockNode::returning("http", json!({}));
    let engine = engine_with(vec![(NodeKind::Http, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "invalid",
        vec![
            manual("t", json!({})),
            Node::action("call", "http", json!({ "method": "TELEPORT" })),
        ],
        vec![edge("t", "call")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(mock.call_count(), 0);
    assert_eq!(run.status, RunStatus::Failed);
    let error = run.error.as_deref().unwrap();
    assert!(error.contains("'url' is required"), "{error}");
    assert!(error.contains("'method' must be one of"), "{error}");
    let entries: Vec<_> = run.entries_for("call").collect();
    assert_eq!(entries.last().unwrap().level, LogLevel::Error);
    assert!(entries.last().unwrap().message.starts_with("Configuration validation failed"));
    assert!(run.output("call").is_none());
}

#[tokio::test]
async fn handler_specific_violations_are_reported_with_rule_violations() {
    let mock = MockNode::rejecting("db", vec!["connection 'main' is not configured".into()]);
    let engine = engine_with(vec![(NodeKind::Database, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "invalid",
        vec![
            manual("t", json!({})),
            Node::action("q", "database", json!({ "operation": "insert" })),
        ],
        vec![edge("t", "q")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(mock.call_count(), 0);
    let error = run.error.unwrap();
    assert!(error.contains("'table' is required for the 'insert' operation"));
    assert!(error.contains("connection 'main' is not configured"));
}

#[tokio::test]
async fn invalid_config_is_not_absorbed_by_continue_on_fail() {
    let engine = WorkflowEngine::with_builtins();
    let wf = Workflow::new(
        "wf",
        "invalid",
        vec![
            manual("t", json!({})),
            Node::action("wait", "delay", json!({})).with_settings(settings(2, 0, true)),
        ],
        vec![edge("t", "wait")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.output("wait").is_none());
}

#[tokio::test]
async fn unregistered_node_type_fails_closed() {
    let engine = WorkflowEngine::with_builtins();
    let wf = Workflow::new(
        "wf",
        "unknown",
        vec![manual("t", json!({})), http("call"), Node::action("after", "transform", json!({ "set": {} }))],
        vec![edge("t", "call"), edge("call", "after")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.error.as_deref(),
        Some("unknown node type 'action/http' for node 'call'")
    );
    assert!(run.output("after").is_none());
}

#[tokio::test]
async fn unknown_subtype_fails_closed() {
    let engine = WorkflowEngine::with_builtins();
    let wf = Workflow::new(
        "wf",
        "unknown",
        vec![manual("t", json!({})), Node::logic("m", "merge", Value::Null)],
        vec![edge("t", "m")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error.unwrap().contains("unknown node type 'logic/merge'"));
}

// ============================================================
// Retry, timeout and continue-on-fail
// ============================================================

#[tokio::test(start_paused = true)]
async fn failing_node_is_attempted_retry_count_plus_one_times() {
    let mock = MockNode::failing("http", "connection refused");
    let engine = engine_with(vec![(NodeKind::Http, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "retry",
        vec![manual("t", json!({})), http("call").with_settings(settings(3, 100, false))],
        vec![edge("t", "call")],
    );

    let started = tokio::time::Instant::now();
    let run = engine.execute(&wf, None).await;

    assert_eq!(mock.call_count(), 4);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("node 'call' failed: connection refused"));

    let failures: Vec<_> = run
        .entries_for("call")
        .filter(|e| e.message.contains("failed:"))
        .collect();
    assert_eq!(failures.len(), 4);
    assert!(failures[..3].iter().all(|e| e.level == LogLevel::Warning));
    assert_eq!(failures[3].level, LogLevel::Error);
    assert_eq!(failures[0].message, "Attempt 1/4 failed: connection refused");
    assert_eq!(failures[3].message, "Attempt 4/4 failed: connection refused");
}

#[tokio::test(start_paused = true)]
async fn flaky_node_succeeds_within_retry_budget() {
    let mock = MockNode::flaky("http", 2, json!({ "ok": true }));
    let engine = engine_with(vec![(NodeKind::Http, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "flaky",
        vec![manual("t", json!({})), http("call").with_settings(settings(2, 50, false))],
        vec![edge("t", "call")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(mock.call_count(), 3);
    assert_eq!(run.output("call"), Some(&json!({ "ok": true })));
}

#[tokio::test]
async fn failure_stops_the_rest_of_the_walk() {
    let failing = MockNode::failing("http", "boom");
    let after = MockNode::echo("after");
    let engine = engine_with(vec![
        (NodeKind::Http, failing.clone()),
        (NodeKind::Email, after.clone()),
    ]);
    let wf = Workflow::new(
        "wf",
        "fail",
        vec![manual("t", json!({})), http("call"), email("notify")],
        vec![edge("t", "call"), edge("call", "notify")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(after.call_count(), 0);
    assert_eq!(run.entries_for("notify").count(), 0);
    assert_eq!(
        run.log.last().unwrap().message,
        "Workflow execution failed: node 'call' failed: boom"
    );
}

#[tokio::test]
async fn continue_on_fail_substitutes_sentinel_and_keeps_going() {
    let failing = MockNode::failing("http", "service unavailable");
    let after = MockNode::echo("after");
    let engine = engine_with(vec![
        (NodeKind::Http, failing.clone()),
        (NodeKind::Email, after.clone()),
    ]);
    let wf = Workflow::new(
        "wf",
        "absorb",
        vec![
            manual("t", json!({})),
            http("call").with_settings(settings(1, 0, true)),
            email("notify"),
        ],
        vec![edge("t", "call"), edge("call", "notify")],
    );

    let run = engine.execute(&wf, None).await;

    let sentinel = failure_sentinel("service unavailable");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(failing.call_count(), 2);
    assert_eq!(run.output("call"), Some(&sentinel));
    assert_eq!(after.inputs(), vec![sentinel]);
    assert!(run
        .entries_for("call")
        .any(|e| e.level == LogLevel::Warning && e.message == "Continuing after failure: service unavailable"));
}

#[tokio::test(start_paused = true)]
async fn slow_node_times_out_per_attempt() {
    let mock = MockNode::new("http", nodes::mock::MockBehaviour::HangUntilCancelled);
    let engine = engine_with(vec![(NodeKind::Http, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "timeout",
        vec![
            manual("t", json!({})),
            http("call").with_settings(NodeSettings {
                timeout_ms: Some(1000),
                retry_count: Some(1),
                ..NodeSettings::default()
            }),
        ],
        vec![edge("t", "call")],
    );

    let started = tokio::time::Instant::now();
    let run = engine.execute(&wf, None).await;

    assert_eq!(mock.call_count(), 2);
    assert!(started.elapsed() >= Duration::from_millis(2000));
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("node 'call' timed out after 1000ms"));
    assert!(node_messages(&run, "call").contains(&"Attempt 1/2 failed: timed out after 1000ms".to_owned()));
}

#[tokio::test(start_paused = true)]
async fn timeout_applies_to_nodes_that_ignore_cancellation() {
    let mock = MockNode::new("http", nodes::mock::MockBehaviour::HangForever);
    let engine = engine_with(vec![(NodeKind::Http, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "stuck",
        vec![
            manual("t", json!({})),
            http("call").with_settings(NodeSettings {
                timeout_ms: Some(500),
                continue_on_fail: Some(true),
                ..NodeSettings::default()
            }),
        ],
        vec![edge("t", "call")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.output("call"), Some(&failure_sentinel("timed out after 500ms")));
}

#[tokio::test(start_paused = true)]
async fn default_timeout_is_thirty_seconds() {
    let mock = MockNode::new("http", nodes::mock::MockBehaviour::HangUntilCancelled);
    let engine = engine_with(vec![(NodeKind::Http, mock.clone())]);
    let wf = Workflow::new(
        "wf",
        "default timeout",
        vec![manual("t", json!({})), http("call")],
        vec![edge("t", "call")],
    );

    let started = tokio::time::Instant::now();
    let run = engine.execute(&wf, None).await;

    assert_eq!(run.error.as_deref(), Some("node 'call' timed out after 30000ms"));
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(mock.call_count(), 1);
}

// ============================================================
// Cancellation
// ============================================================

fn slow_workflow() -> Workflow {
    Workflow::new(
        "wf",
        "slow",
        vec![
            manual("t", json!({})),
            Node::action("wait", "delay", json!({ "duration_ms": 10_000 })),
            Node::action("after", "transform", json!({ "set": { "done": true } })),
        ],
        vec![edge("t", "wait"), edge("wait", "after")],
    )
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_the_run_and_skips_unreached_nodes() {
    let engine = Arc::new(WorkflowEngine::with_builtins());
    let wf = slow_workflow();

    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.execute(&wf, None).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.stop();
    let run = task.await.unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.completed_at.is_some());
    assert!(run.output("t").is_some());
    assert!(run.output("wait").is_none());
    assert!(run.output("after").is_none());
    assert_eq!(run.entries_for("after").count(), 0);
    assert_eq!(run.log.last().unwrap().message, "Workflow execution cancelled");
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_the_retry_delay() {
    let mock = MockNode::failing("http", "flaky upstream");
    let engine = Arc::new(engine_with(vec![(NodeKind::Http, mock.clone())]));
    let wf = Workflow::new(
        "wf",
        "retry",
        vec![
            manual("t", json!({})),
            http("call").with_settings(settings(5, 60_000, false)),
        ],
        vec![edge("t", "call")],
    );

    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.execute(&wf, None).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.stop();
    let run = task.await.unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_wins_over_non_cooperative_node() {
    let mock = MockNode::new("http", nodes::mock::MockBehaviour::HangForever);
    let engine = Arc::new(engine_with(vec![(NodeKind::Http, mock.clone())]));
    let wf = Workflow::new(
        "wf",
        "stuck",
        vec![manual("t", json!({})), http("call")],
        vec![edge("t", "call")],
    );

    let task = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.execute(&wf, None).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.stop();
    let run = task.await.unwrap();

    assert_eq!(run.status, RunStatus::Cancelled);
    assert!(run.output("call").is_none());
}

/// Reports cancellation on every call without any stop request.
struct GivesUp;

#[async_trait]
impl NodeHandler for GivesUp {
    async fn execute(&self, _ctx: &ExecutionContext) -> Result<Value, NodeError> {
        Err(NodeError::Cancelled)
    }
}

#[tokio::test]
async fn node_cancelling_itself_fails_the_run_without_retry() {
    let after = MockNode::echo("after");
    let engine = engine_with(vec![
        (NodeKind::Http, Arc::new(GivesUp)),
        (NodeKind::Email, after.clone()),
    ]);
    let wf = Workflow::new(
        "wf",
        "gives up",
        vec![
            manual("t", json!({})),
            http("call").with_settings(settings(3, 0, true)),
            email("notify"),
        ],
        vec![edge("t", "call"), edge("call", "notify")],
    );

    let run = engine.execute(&wf, None).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("node 'call' cancelled its own execution"));
    assert_eq!(after.call_count(), 0);
    assert!(run.output("call").is_none());

    let entries: Vec<_> = run.entries_for("call").collect();
    assert_eq!(entries.len(), 2, "{entries:?}");
    assert_eq!(entries[1].level, LogLevel::Error);
    assert_eq!(entries[1].message, "Attempt 1/4 failed: cancelled by the node");
}

#[tokio::test]
async fn stop_before_execute_does_not_cancel_the_next_run() {
    let engine = WorkflowEngine::with_builtins();
    engine.stop();

    let run = engine.execute(&status_workflow("active"), None).await;

    assert_eq!(run.status, RunStatus::Completed);
}

// ============================================================
// Determinism and run record
// ============================================================

#[tokio::test]
async fn repeated_runs_produce_identical_outputs_and_messages() {
    let engine = WorkflowEngine::with_builtins();
    let wf = status_workflow("active");

    let first = engine.execute(&wf, None).await;
    let second = engine.execute(&wf, None).await;

    assert_ne!(first.id, second.id);
    assert_eq!(first.outputs, second.outputs);
    assert_eq!(messages(&first), messages(&second));
}

#[tokio::test]
async fn successful_run_log_is_bracketed_by_start_and_completion() {
    let engine = WorkflowEngine::with_builtins();

    let run = engine.execute(&status_workflow("active"), None).await;

    let messages = messages(&run);
    assert_eq!(messages.first().unwrap(), "Workflow 'branch' execution started");
    assert_eq!(messages.last().unwrap(), "Workflow execution completed");
    assert!(run.error.is_none());
    assert!(run.completed_at.unwrap() >= run.started_at);
}

#[test]
fn validate_reports_every_problem_without_running() {
    let engine = WorkflowEngine::with_builtins();
    let wf = Workflow::new(
        "wf",
        "broken",
        vec![
            manual("t", json!({})),
            http("call"),
            Node::action("wait", "delay", json!({ "duration_ms": "soon" })),
        ],
        vec![edge("t", "call"), edge("call", "missing")],
    );

    let errors = engine.validate(&wf).unwrap_err();

    assert_eq!(errors.len(), 3, "{errors:?}");
    assert!(matches!(errors[0], crate::EngineError::UnknownNodeReference { .. }));
    assert!(matches!(errors[1], crate::EngineError::UnknownNodeType { .. }));
    assert!(matches!(errors[2], crate::EngineError::InvalidConfig { .. }));
}
