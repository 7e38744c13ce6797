//! Wait-for node: blocks its fiber until other nodes reach their completion
//! counts, then routes `next`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;

use super::behavior::{NodeBehavior, NodeResult, Transition, WaitFor};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("wait-for")
        .with_label("Wait For Nodes")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("nodes"))
        .with_pin(PinDescriptor::data_out("nodes"))
        .with_pin(PinDescriptor::flow_out("next"))
        .with_parameter(ParameterDescriptor::new("nodes"))
        .with_parameter(ParameterDescriptor::with_default("waitForNext", json!(false)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitForConfig {
    /// Node ids as an array, or one comma/whitespace-delimited string.
    pub nodes: Option<Value>,
    pub wait_for_next: bool,
}

pub struct WaitForNodesNode {
    config: WaitForConfig,
}

impl WaitForNodesNode {
    pub fn from_config(config: WaitForConfig) -> Self {
        Self { config }
    }
}

/// Accepts `"a, b c"` and `["a", "b", "c"]` shapes; anything else yields no
/// targets.
fn parse_targets(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(text)) => text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl NodeBehavior for WaitForNodesNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let mut targets = parse_targets(self.config.nodes.as_ref());
        targets.extend(parse_targets(ctx.input("nodes")));

        let mut seen = HashSet::new();
        targets.retain(|id| seen.insert(id.clone()));

        if targets.is_empty() {
            return Ok(NodeResult::failure("wait-for requires at least one target node"));
        }

        Ok(NodeResult::success()
            .with_output("nodes", json!(targets))
            .with_wait(WaitFor {
                nodes: targets,
                next_completion: self.config.wait_for_next,
            })
            .with_transition(Transition::to("next")))
    }
}
