//! Start node: entry marker that immediately routes its continuation.

use async_trait::async_trait;
use serde::Deserialize;

use super::behavior::{NodeBehavior, NodeResult};
use super::registry::{NodeDefinition, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("start")
        .with_label("Start")
        .with_default_output("next")
        .with_pin(PinDescriptor::flow_out("next"))
}

#[derive(Debug, Default, Deserialize)]
pub struct StartConfig {}

pub struct StartNode;

impl StartNode {
    pub fn from_config(_config: StartConfig) -> Self {
        Self
    }
}

#[async_trait]
impl NodeBehavior for StartNode {
    async fn on_execute(&self, _ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::success())
    }
}
