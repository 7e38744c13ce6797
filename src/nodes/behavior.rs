//! Node protocol: the trait every node kind implements and the result shape
//! the scheduler consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::context::ExecutionContext;
use crate::error::NodeError;

/// Outcome classification of one node invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Success,
    Running,
    Failure,
    Skipped,
    Cancelled,
}

/// How a routed target executes relative to the current fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Sequential,
    Parallel,
}

/// A directive to continue through one output pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub pin: String,
    /// Filled by the runner from the pin's declared strategy when absent.
    pub strategy: Option<Strategy>,
    /// For parallel transitions: whether the current fiber awaits the forked
    /// fiber. Treated as `true` when absent.
    pub await_completion: Option<bool>,
    pub group: Option<String>,
}

impl Transition {
    pub fn to(pin: impl Into<String>) -> Self {
        Self {
            pin: pin.into(),
            strategy: None,
            await_completion: None,
            group: None,
        }
    }

    pub fn parallel(pin: impl Into<String>) -> Self {
        Self {
            strategy: Some(Strategy::Parallel),
            ..Self::to(pin)
        }
    }

    pub fn with_await(mut self, await_completion: bool) -> Self {
        self.await_completion = Some(await_completion);
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Blocks the fiber until the named nodes reach the required completion
/// count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitFor {
    pub nodes: Vec<String>,
    /// When true, only a completion that happens *after* now satisfies the
    /// wait; prior completions do not count.
    pub next_completion: bool,
}

/// What a node hands back to the scheduler.
#[derive(Debug, Clone)]
pub struct NodeResult {
    pub status: NodeStatus,
    pub outputs: HashMap<String, Value>,
    /// Explicit continuations. When `None` and the status is `Success`, the
    /// runner synthesizes one from the definition's default output.
    pub transitions: Option<Vec<Transition>>,
    pub wait_for: Option<WaitFor>,
    /// Human-readable message accompanying a `Failure` status.
    pub error: Option<String>,
}

impl Default for NodeResult {
    fn default() -> Self {
        Self {
            status: NodeStatus::Success,
            outputs: HashMap::new(),
            transitions: None,
            wait_for: None,
            error: None,
        }
    }
}

impl NodeResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn skipped() -> Self {
        Self {
            status: NodeStatus::Skipped,
            ..Self::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: NodeStatus::Cancelled,
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: NodeStatus::Failure,
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, pin: &str, value: Value) -> Self {
        self.outputs.insert(pin.to_string(), value);
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.get_or_insert_with(Vec::new).push(transition);
        self
    }

    pub fn with_wait(mut self, wait: WaitFor) -> Self {
        self.wait_for = Some(wait);
        self
    }
}

/// Behaviour of one node kind.
///
/// The scheduler calls [`execute`](NodeBehavior::execute), which gates on the
/// run signal before dispatching to the subclass hooks; implementations
/// normally provide [`on_execute`](NodeBehavior::on_execute) only.
/// [`on_fast_forward`](NodeBehavior::on_fast_forward) defaults to a `skipped`
/// result with no transitions; nodes that should still route under
/// fast-forward override it to declare the transitions they would have taken.
#[async_trait]
pub trait NodeBehavior: Send + Sync {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError>;

    async fn on_fast_forward(&self, _ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::skipped())
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        if ctx.signal.is_cancelled() {
            return Ok(NodeResult::skipped());
        }
        if ctx.is_fast_forwarding() {
            return self.on_fast_forward(ctx).await;
        }
        self.on_execute(ctx).await
    }
}
