//! Loop node: counts iterations through a blackboard key so cycles in the
//! flow graph terminate.
//!
//! Downstream `body` chains connect back to the loop node; each re-entry
//! reads the stored index, routes `body` while it is below the count, and
//! clears the key before routing `complete`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::behavior::{NodeBehavior, NodeResult, Transition};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("loop")
        .with_label("Loop")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("count"))
        .with_pin(PinDescriptor::data_out("index"))
        .with_pin(PinDescriptor::flow_out("body"))
        .with_pin(PinDescriptor::flow_out("complete"))
        .with_parameter(ParameterDescriptor::with_default("count", json!(0)))
        .with_parameter(ParameterDescriptor::with_default("loopKey", json!("index")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoopConfig {
    pub count: u64,
    pub loop_key: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            count: 0,
            loop_key: "index".to_string(),
        }
    }
}

pub struct LoopNode {
    config: LoopConfig,
}

impl LoopNode {
    pub fn from_config(config: LoopConfig) -> Self {
        Self { config }
    }

    fn counter_key(&self, ctx: &ExecutionContext) -> String {
        format!("loop:{}:{}", ctx.node_id, self.config.loop_key)
    }
}

#[async_trait]
impl NodeBehavior for LoopNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let count = ctx
            .input("count")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.count);
        let key = self.counter_key(ctx);
        let index = ctx
            .blackboard
            .get(&key)
            .and_then(|value| value.as_u64())
            .unwrap_or(0);

        if index < count {
            ctx.blackboard.set(&key, json!(index + 1));
            Ok(NodeResult::success()
                .with_output("index", json!(index))
                .with_transition(Transition::to("body")))
        } else {
            ctx.blackboard.remove(&key);
            Ok(NodeResult::success().with_transition(Transition::to("complete")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHostAdapter;
    use std::sync::Arc;

    fn loop_node(count: u64) -> LoopNode {
        LoopNode::from_config(LoopConfig {
            count,
            loop_key: "index".into(),
        })
    }

    #[tokio::test]
    async fn test_loop_steps_then_completes() {
        let node = loop_node(2);
        let ctx = ExecutionContext::new("l1", Arc::new(NullHostAdapter));

        for expected in 0..2u64 {
            let result = node.execute(&ctx).await.unwrap();
            assert_eq!(result.transitions.unwrap()[0].pin, "body");
            assert_eq!(result.outputs.get("index"), Some(&json!(expected)));
        }

        let result = node.execute(&ctx).await.unwrap();
        assert_eq!(result.transitions.unwrap()[0].pin, "complete");
        // Counter is cleared so a later run of the same node starts over.
        assert_eq!(ctx.blackboard.get("loop:l1:index"), None);
    }

    #[tokio::test]
    async fn test_loop_count_zero_goes_straight_to_complete() {
        let node = loop_node(0);
        let ctx = ExecutionContext::new("l1", Arc::new(NullHostAdapter));
        let result = node.execute(&ctx).await.unwrap();
        assert_eq!(result.transitions.unwrap()[0].pin, "complete");
        assert!(result.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_loop_count_input_overrides_parameter() {
        let node = loop_node(0);
        let ctx = ExecutionContext::new("l1", Arc::new(NullHostAdapter))
            .with_input("count", json!(1));
        let result = node.execute(&ctx).await.unwrap();
        assert_eq!(result.transitions.unwrap()[0].pin, "body");
    }
}
