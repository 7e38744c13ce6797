//! Invoke-action node: calls a component action through the host adapter.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::behavior::{NodeBehavior, NodeResult};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("invoke-action")
        .with_label("Invoke Action")
        .with_default_output("next")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("entity"))
        .with_pin(PinDescriptor::data_in("args"))
        .with_pin(PinDescriptor::data_out("result"))
        .with_pin(PinDescriptor::flow_out("next"))
        .with_parameter(ParameterDescriptor::new("componentType"))
        .with_parameter(ParameterDescriptor::new("actionId"))
        .with_parameter(ParameterDescriptor::new("targetEntity"))
        .with_parameter(ParameterDescriptor::with_default(
            "useCurrentEntity",
            serde_json::json!(true),
        ))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvokeActionConfig {
    pub component_type: Option<String>,
    pub action_id: Option<String>,
    pub target_entity: Option<String>,
    /// Accepted for asset compatibility; entity resolution is always input,
    /// then `targetEntity`, then the context entity.
    pub use_current_entity: bool,
}

impl Default for InvokeActionConfig {
    fn default() -> Self {
        Self {
            component_type: None,
            action_id: None,
            target_entity: None,
            use_current_entity: true,
        }
    }
}

pub struct InvokeActionNode {
    config: InvokeActionConfig,
}

impl InvokeActionNode {
    pub fn from_config(config: InvokeActionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeBehavior for InvokeActionNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let Some(component_type) = self.config.component_type.as_deref() else {
            return Ok(NodeResult::failure("invoke-action requires a component type"));
        };
        let Some(action_id) = self.config.action_id.as_deref() else {
            return Ok(NodeResult::failure("invoke-action requires an action id"));
        };

        let entity = ctx
            .input("entity")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.config.target_entity.clone())
            .or_else(|| ctx.entity_id.clone());
        let Some(entity) = entity else {
            return Ok(NodeResult::failure("invoke-action has no target entity"));
        };

        let args: Vec<Value> = match ctx.input("args") {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        };

        // Adapter rejections propagate; the fiber treats them as fatal.
        let value = ctx
            .adapter
            .invoke_action(&entity, component_type, action_id, &args)
            .await?;
        Ok(NodeResult::success().with_output("result", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::HostAdapter;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingAdapter {
        calls: Mutex<Vec<(String, String, String, Vec<Value>)>>,
    }

    #[async_trait]
    impl HostAdapter for RecordingAdapter {
        async fn entity(&self, entity_id: &str) -> Result<Value, HostError> {
            Ok(json!({ "id": entity_id }))
        }

        async fn component(
            &self,
            _entity_id: &str,
            _component_type: &str,
        ) -> Result<Option<Value>, HostError> {
            Ok(None)
        }

        async fn invoke_action(
            &self,
            entity_id: &str,
            component_type: &str,
            action_id: &str,
            args: &[Value],
        ) -> Result<Value, HostError> {
            self.calls.lock().push((
                entity_id.to_string(),
                component_type.to_string(),
                action_id.to_string(),
                args.to_vec(),
            ));
            Ok(json!("done"))
        }
    }

    fn node(target_entity: Option<&str>) -> InvokeActionNode {
        InvokeActionNode::from_config(InvokeActionConfig {
            component_type: Some("Health".into()),
            action_id: Some("damage".into()),
            target_entity: target_entity.map(str::to_string),
            use_current_entity: true,
        })
    }

    #[tokio::test]
    async fn test_invoke_uses_context_entity_by_default() {
        let adapter = Arc::new(RecordingAdapter::default());
        let ctx = ExecutionContext::new("ia", adapter.clone())
            .with_entity("npc-7")
            .with_input("args", json!([10]));
        let result = node(None).execute(&ctx).await.unwrap();
        assert_eq!(result.outputs.get("result"), Some(&json!("done")));

        let calls = adapter.calls.lock();
        assert_eq!(calls[0].0, "npc-7");
        assert_eq!(calls[0].1, "Health");
        assert_eq!(calls[0].2, "damage");
        assert_eq!(calls[0].3, vec![json!(10)]);
    }

    #[tokio::test]
    async fn test_entity_resolution_order() {
        let adapter = Arc::new(RecordingAdapter::default());
        // Input beats parameter beats context.
        let ctx = ExecutionContext::new("ia", adapter.clone())
            .with_entity("ctx-entity")
            .with_input("entity", json!("wired-entity"));
        node(Some("param-entity")).execute(&ctx).await.unwrap();
        assert_eq!(adapter.calls.lock()[0].0, "wired-entity");

        let ctx = ExecutionContext::new("ia", adapter.clone()).with_entity("ctx-entity");
        node(Some("param-entity")).execute(&ctx).await.unwrap();
        assert_eq!(adapter.calls.lock()[1].0, "param-entity");
    }

    #[tokio::test]
    async fn test_missing_config_is_node_failure() {
        let adapter = Arc::new(RecordingAdapter::default());
        let ctx = ExecutionContext::new("ia", adapter);
        let node = InvokeActionNode::from_config(InvokeActionConfig::default());
        let result = node.execute(&ctx).await.unwrap();
        assert_eq!(result.status, crate::nodes::behavior::NodeStatus::Failure);
    }

    #[tokio::test]
    async fn test_adapter_rejection_propagates() {
        let ctx = ExecutionContext::new("ia", Arc::new(crate::host::NullHostAdapter))
            .with_entity("e1");
        let result = node(None).execute(&ctx).await;
        assert!(matches!(result, Err(NodeError::Host(_))));
    }
}
