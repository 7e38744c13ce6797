//! Blackboard access nodes: set and get graph-level variables.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::behavior::{NodeBehavior, NodeResult};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn set_definition() -> NodeDefinition {
    NodeDefinition::new("set-variable")
        .with_label("Set Variable")
        .with_default_output("next")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("key"))
        .with_pin(PinDescriptor::data_in("value"))
        .with_pin(PinDescriptor::data_out("value"))
        .with_pin(PinDescriptor::flow_out("next"))
        .with_parameter(ParameterDescriptor::new("key"))
        .with_parameter(ParameterDescriptor::new("value"))
}

pub fn get_definition() -> NodeDefinition {
    NodeDefinition::new("get-variable")
        .with_label("Get Variable")
        .with_default_output("next")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("key"))
        .with_pin(PinDescriptor::data_out("value"))
        .with_pin(PinDescriptor::flow_out("next"))
        .with_parameter(ParameterDescriptor::new("key"))
        .with_parameter(ParameterDescriptor::new("defaultValue"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetVariableConfig {
    pub key: Option<String>,
    pub value: Option<Value>,
}

pub struct SetVariableNode {
    config: SetVariableConfig,
}

impl SetVariableNode {
    pub fn from_config(config: SetVariableConfig) -> Self {
        Self { config }
    }
}

fn resolve_key(ctx: &ExecutionContext, configured: &Option<String>) -> Option<String> {
    ctx.input("key")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| configured.clone())
}

#[async_trait]
impl NodeBehavior for SetVariableNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let Some(key) = resolve_key(ctx, &self.config.key) else {
            return Ok(NodeResult::failure("set-variable requires a key"));
        };
        let value = ctx
            .input("value")
            .cloned()
            .or_else(|| self.config.value.clone())
            .unwrap_or(Value::Null);
        ctx.blackboard.set(&key, value.clone());
        Ok(NodeResult::success().with_output("value", value))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetVariableConfig {
    pub key: Option<String>,
    pub default_value: Option<Value>,
}

pub struct GetVariableNode {
    config: GetVariableConfig,
}

impl GetVariableNode {
    pub fn from_config(config: GetVariableConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeBehavior for GetVariableNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let Some(key) = resolve_key(ctx, &self.config.key) else {
            return Ok(NodeResult::failure("get-variable requires a key"));
        };
        let value = ctx
            .blackboard
            .get(&key)
            .or_else(|| self.config.default_value.clone())
            .unwrap_or(Value::Null);
        Ok(NodeResult::success().with_output("value", value))
    }
}
