//! Parallel node: forks up to four branches onto their own fibers.

use async_trait::async_trait;
use serde::Deserialize;

use super::behavior::{NodeBehavior, NodeResult, Transition};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

const BRANCH_PINS: [&str; 4] = ["branchA", "branchB", "branchC", "branchD"];

pub fn definition() -> NodeDefinition {
    let mut definition = NodeDefinition::new("parallel")
        .with_label("Parallel")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_parameter(ParameterDescriptor::with_default(
            "awaitCompletion",
            serde_json::json!(true),
        ));
    for pin in BRANCH_PINS {
        definition = definition.with_pin(PinDescriptor::flow_out(pin).parallel());
    }
    definition
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParallelConfig {
    /// Whether the forking fiber awaits each branch before continuing.
    pub await_completion: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            await_completion: true,
        }
    }
}

pub struct ParallelNode {
    config: ParallelConfig,
}

impl ParallelNode {
    pub fn from_config(config: ParallelConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeBehavior for ParallelNode {
    async fn on_execute(&self, _ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let mut result = NodeResult::success();
        for pin in BRANCH_PINS {
            result = result.with_transition(
                Transition::parallel(pin).with_await(self.config.await_completion),
            );
        }
        Ok(result)
    }
}
