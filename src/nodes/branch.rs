//! Branch node: routes `true` or `false` from a coerced condition.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::behavior::{NodeBehavior, NodeResult, Transition};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("branch")
        .with_label("Branch")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("condition"))
        .with_pin(PinDescriptor::flow_out("true"))
        .with_pin(PinDescriptor::flow_out("false"))
        .with_parameter(ParameterDescriptor::new("defaultCondition"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchConfig {
    /// Fallback when no data connection or literal supplies `condition`.
    pub default_condition: Option<Value>,
}

pub struct BranchNode {
    config: BranchConfig,
}

impl BranchNode {
    pub fn from_config(config: BranchConfig) -> Self {
        Self { config }
    }
}

/// Boolean coercion: strings are truthy iff non-empty, numbers iff non-zero,
/// `null` and absence are false, arrays and objects are truthy.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[async_trait]
impl NodeBehavior for BranchNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let condition = ctx
            .input("condition")
            .cloned()
            .or_else(|| self.config.default_condition.clone());
        let pin = if truthy(condition.as_ref()) {
            "true"
        } else {
            "false"
        };
        Ok(NodeResult::success().with_transition(Transition::to(pin)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHostAdapter;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_truthiness_coercion() {
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(null))));
        assert!(!truthy(Some(&json!(false))));
        assert!(truthy(Some(&json!(true))));
        assert!(!truthy(Some(&json!(0))));
        assert!(truthy(Some(&json!(0.5))));
        assert!(!truthy(Some(&json!(""))));
        assert!(truthy(Some(&json!("no"))));
        assert!(truthy(Some(&json!([]))));
        assert!(truthy(Some(&json!({}))));
    }

    async fn taken_pin(node: &BranchNode, ctx: &ExecutionContext) -> String {
        let result = node.execute(ctx).await.unwrap();
        result.transitions.unwrap()[0].pin.clone()
    }

    #[tokio::test]
    async fn test_branch_routes_from_input() {
        let node = BranchNode::from_config(BranchConfig::default());
        let ctx = ExecutionContext::new("b", Arc::new(NullHostAdapter))
            .with_input("condition", json!("yes"));
        assert_eq!(taken_pin(&node, &ctx).await, "true");

        let ctx = ExecutionContext::new("b", Arc::new(NullHostAdapter))
            .with_input("condition", json!(0));
        assert_eq!(taken_pin(&node, &ctx).await, "false");
    }

    #[tokio::test]
    async fn test_branch_falls_back_to_parameter() {
        let node = BranchNode::from_config(BranchConfig {
            default_condition: Some(json!(true)),
        });
        let ctx = ExecutionContext::new("b", Arc::new(NullHostAdapter));
        assert_eq!(taken_pin(&node, &ctx).await, "true");
    }
}
