//! Handle to a running or completed graph run.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::core::runner::{RunCore, RunStatus};
use crate::core::signal::RunSignal;

/// Control and observation surface returned by
/// [`GraphRunner::run`](crate::core::runner::GraphRunner::run). Cloneable;
/// every clone addresses the same run.
#[derive(Clone)]
pub struct RunHandle {
    core: Arc<RunCore>,
    status_rx: watch::Receiver<RunStatus>,
}

impl RunHandle {
    pub(crate) fn new(core: Arc<RunCore>, status_rx: watch::Receiver<RunStatus>) -> Self {
        Self { core, status_rx }
    }

    /// Current state (non-blocking).
    pub fn status(&self) -> RunStatus {
        *self.status_rx.borrow()
    }

    /// Block until the run reaches a terminal state and return it.
    pub async fn await_completion(&self) -> RunStatus {
        let mut rx = self.status_rx.clone();
        loop {
            let status = *rx.borrow();
            if status.is_terminal() {
                return status;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// Idempotent cancellation. Pending waiters resolve immediately so
    /// blocked fibers can observe the signal and drain.
    pub fn cancel(&self, reason: Option<&str>) {
        self.core.cancel(reason);
    }

    /// Route the named node through `on_fast_forward` on its next
    /// invocation.
    pub fn fast_forward_node(&self, node_id: &str) {
        self.core.fast_forward.lock().add_node(node_id);
    }

    /// Fast-forward every node matched by `rule((node_id, node_type))`.
    pub fn fast_forward_where(
        &self,
        rule: impl Fn(&str, &str) -> bool + Send + Sync + 'static,
    ) {
        self.core.fast_forward.lock().add_rule(Box::new(rule));
    }

    /// The run's signal, for composing with node-external teardown.
    pub fn signal(&self) -> RunSignal {
        self.core.signal.clone()
    }

    /// Flat `"nodeId:pinId" → value` snapshot of the run's scope.
    pub fn scope_snapshot(&self) -> HashMap<String, Value> {
        self.core.scope.snapshot()
    }

    /// How many times the node has completed this run.
    pub fn completion_count(&self, node_id: &str) -> u64 {
        self.core.completions.lock().completions(node_id)
    }

    /// Number of node invocations that reported a `failure` result.
    pub fn node_failures(&self) -> u32 {
        self.core.node_failures()
    }
}
