//! Delay node: sleeps for a configured duration, race-cancellable by the run
//! signal.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::behavior::{NodeBehavior, NodeResult, Transition};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("delay")
        .with_label("Delay")
        .with_default_output("next")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("durationMs"))
        .with_pin(PinDescriptor::flow_out("next"))
        .with_parameter(ParameterDescriptor::with_default(
            "durationMs",
            serde_json::json!(0),
        ))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DelayConfig {
    pub duration_ms: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self { duration_ms: 0 }
    }
}

pub struct DelayNode {
    config: DelayConfig,
}

impl DelayNode {
    pub fn from_config(config: DelayConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeBehavior for DelayNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let duration_ms = ctx
            .input("durationMs")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.duration_ms);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(duration_ms)) => {
                Ok(NodeResult::success().with_transition(Transition::to("next")))
            }
            _ = ctx.signal.cancelled() => Ok(NodeResult::cancelled()),
            _ = ctx.signal.fast_forwarded() => {
                Ok(NodeResult::skipped().with_transition(Transition::to("next")))
            }
        }
    }

    /// Under fast-forward the sleep never happens, but the continuation is
    /// still declared.
    async fn on_fast_forward(&self, _ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::skipped().with_transition(Transition::to("next")))
    }
}
