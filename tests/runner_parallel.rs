//! Parallel fibers and the wait primitive: forked branches, joins on
//! completion counts, and the already-satisfied fast path.

mod common;

use common::*;
use fiberflow::{GraphRunner, NullHostAdapter, RunStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_parallel_join_via_wait_for() {
    let log = new_log();
    let registry = test_registry(&log);
    // start routes two sequential targets: the fork, then the join. The fork
    // is fire-and-forget, so the join genuinely waits on the delays.
    let graph = hydrate_json(
        json!({
            "id": "fork-join",
            "nodes": [
                {"id": "start", "type": "start"},
                {"id": "fork", "type": "parallel", "params": {"awaitCompletion": false}},
                {"id": "dA", "type": "delay", "params": {"durationMs": 10}},
                {"id": "dB", "type": "delay", "params": {"durationMs": 10}},
                {"id": "join", "type": "wait-for", "params": {"nodes": "dA, dB"}},
                {"id": "after", "type": "probe"}
            ],
            "connections": [
                {"kind": "flow", "from": {"nodeId": "start", "pinId": "next"}, "to": {"nodeId": "fork", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "start", "pinId": "next"}, "to": {"nodeId": "join", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "fork", "pinId": "branchA"}, "to": {"nodeId": "dA", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "fork", "pinId": "branchB"}, "to": {"nodeId": "dB", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "join", "pinId": "next"}, "to": {"nodeId": "after", "pinId": "in"}}
            ]
        }),
        &registry,
    );

    let runner = GraphRunner::builder(graph, Arc::new(NullHostAdapter)).build();
    let handle = runner.run().await;
    let status = tokio::time::timeout(Duration::from_secs(2), handle.await_completion())
        .await
        .expect("join should unblock once both delays complete");
    assert_eq!(status, RunStatus::Completed);

    assert_eq!(hit_order(&log), ["after"]);
    assert_eq!(handle.completion_count("dA"), 1);
    assert_eq!(handle.completion_count("dB"), 1);
    assert_eq!(handle.completion_count("join"), 1);
    assert_eq!(
        handle.scope_snapshot().get("join:nodes"),
        Some(&json!(["dA", "dB"]))
    );
}

#[tokio::test]
async fn test_awaited_fork_runs_branches_before_continuation() {
    let log = new_log();
    let registry = test_registry(&log);
    let graph = hydrate_json(
        json!({
            "id": "awaited-fork",
            "nodes": [
                {"id": "start", "type": "start"},
                {"id": "fork", "type": "parallel", "params": {"awaitCompletion": true}},
                {"id": "dA", "type": "delay", "params": {"durationMs": 10}},
                {"id": "pA", "type": "probe"},
                {"id": "after", "type": "probe"}
            ],
            "connections": [
                {"kind": "flow", "from": {"nodeId": "start", "pinId": "next"}, "to": {"nodeId": "fork", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "start", "pinId": "next"}, "to": {"nodeId": "after", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "fork", "pinId": "branchA"}, "to": {"nodeId": "dA", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "dA", "pinId": "next"}, "to": {"nodeId": "pA", "pinId": "in"}}
            ]
        }),
        &registry,
    );

    let runner = GraphRunner::builder(graph, Arc::new(NullHostAdapter)).build();
    let handle = runner.run().await;
    assert_eq!(handle.await_completion().await, RunStatus::Completed);

    // The forking fiber awaited the branch, so pA precedes after.
    assert_eq!(hit_order(&log), ["pA", "after"]);
}

#[tokio::test]
async fn test_wait_for_already_completed_resolves_without_suspension() {
    let log = new_log();
    let registry = test_registry(&log);
    let graph = hydrate_json(
        json!({
            "id": "already-done",
            "nodes": [
                {"id": "A", "type": "probe"},
                {"id": "waiter", "type": "wait-for", "params": {"nodes": "A"}},
                {"id": "after", "type": "probe"}
            ],
            "connections": [
                {"kind": "flow", "from": {"nodeId": "A", "pinId": "next"}, "to": {"nodeId": "waiter", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "waiter", "pinId": "next"}, "to": {"nodeId": "after", "pinId": "in"}}
            ]
        }),
        &registry,
    );

    let runner = GraphRunner::builder(graph, Arc::new(NullHostAdapter)).build();
    let handle = runner.run().await;
    let status = tokio::time::timeout(Duration::from_millis(500), handle.await_completion())
        .await
        .expect("a satisfied wait must not suspend");
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(hit_order(&log), ["A", "after"]);
}

#[tokio::test]
async fn test_wait_for_next_completion_blocks_until_later_run() {
    let log = new_log();
    let registry = test_registry(&log);
    // Two roots: one fiber waits for the *next* completion of `pinger`,
    // the other completes it after a short delay.
    let graph = hydrate_json(
        json!({
            "id": "next-completion",
            "root": ["waiter", "d"],
            "nodes": [
                {"id": "waiter", "type": "wait-for", "params": {"nodes": "pinger", "waitForNext": true}},
                {"id": "after", "type": "probe"},
                {"id": "d", "type": "delay", "params": {"durationMs": 20}},
                {"id": "pinger", "type": "probe"}
            ],
            "connections": [
                {"kind": "flow", "from": {"nodeId": "waiter", "pinId": "next"}, "to": {"nodeId": "after", "pinId": "in"}},
                {"kind": "flow", "from": {"nodeId": "d", "pinId": "next"}, "to": {"nodeId": "pinger", "pinId": "in"}}
            ]
        }),
        &registry,
    );

    let runner = GraphRunner::builder(graph, Arc::new(NullHostAdapter)).build();
    let handle = runner.run().await;
    let status = tokio::time::timeout(Duration::from_secs(2), handle.await_completion())
        .await
        .expect("waiter should unblock on pinger's completion");
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(hit_order(&log), ["pinger", "after"]);
}

#[tokio::test]
async fn test_wait_for_unknown_target_fails_the_run() {
    let log = new_log();
    let registry = test_registry(&log);
    let graph = hydrate_json(
        json!({
            "id": "ghost-wait",
            "nodes": [
                {"id": "waiter", "type": "wait-for", "params": {"nodes": "ghost"}},
                {"id": "after", "type": "probe"}
            ],
            "connections": [
                {"kind": "flow", "from": {"nodeId": "waiter", "pinId": "next"}, "to": {"nodeId": "after", "pinId": "in"}}
            ]
        }),
        &registry,
    );

    let runner = GraphRunner::builder(graph, Arc::new(NullHostAdapter)).build();
    let handle = runner.run().await;
    assert_eq!(handle.await_completion().await, RunStatus::Failed);
    assert!(hit_order(&log).is_empty());
}
