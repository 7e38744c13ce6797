//! Run-subgraph node: spawns a nested run of another graph from the library.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::behavior::{NodeBehavior, NodeResult, Transition};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::core::runner::{GraphRunner, RunStatus};
use crate::core::scope::{Blackboard, Scope};
use crate::core::signal::SignalEvent;
use crate::error::NodeError;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("run-subgraph")
        .with_label("Run Subgraph")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_pin(PinDescriptor::data_in("graphId"))
        .with_pin(PinDescriptor::data_in("args"))
        .with_pin(PinDescriptor::flow_out("next"))
        .with_parameter(ParameterDescriptor::new("graphId"))
        .with_parameter(ParameterDescriptor::with_default("shareScope", serde_json::json!(false)))
        .with_parameter(ParameterDescriptor::with_default(
            "shareBlackboard",
            serde_json::json!(false),
        ))
        .with_parameter(ParameterDescriptor::with_default(
            "awaitCompletion",
            serde_json::json!(true),
        ))
        .with_parameter(ParameterDescriptor::new("args"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSubgraphConfig {
    pub graph_id: Option<String>,
    /// Share the parent's pin-level scope instead of starting empty.
    pub share_scope: bool,
    pub share_blackboard: bool,
    pub await_completion: bool,
    /// Seeded into the child blackboard before it starts.
    pub args: Option<serde_json::Map<String, Value>>,
}

impl Default for RunSubgraphConfig {
    fn default() -> Self {
        Self {
            graph_id: None,
            share_scope: false,
            share_blackboard: false,
            await_completion: true,
            args: None,
        }
    }
}

pub struct RunSubgraphNode {
    config: RunSubgraphConfig,
}

impl RunSubgraphNode {
    pub fn from_config(config: RunSubgraphConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeBehavior for RunSubgraphNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let graph_id = ctx
            .input("graphId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.config.graph_id.clone());
        let Some(graph_id) = graph_id else {
            return Ok(NodeResult::failure("run-subgraph requires a graph id"));
        };
        let Some(library) = ctx.library.clone() else {
            return Ok(NodeResult::failure("run-subgraph requires a graph library"));
        };
        let child_graph = match library.instantiate(&graph_id) {
            Ok(graph) => graph,
            Err(error) => return Ok(NodeResult::failure(error.to_string())),
        };

        let scope = if self.config.share_scope {
            ctx.scope.clone()
        } else {
            Scope::new()
        };
        let blackboard = if self.config.share_blackboard {
            ctx.blackboard.clone()
        } else {
            Blackboard::new()
        };

        let mut seed = self.config.args.clone().unwrap_or_default();
        if let Some(Value::Object(extra)) = ctx.input("args") {
            for (key, value) in extra {
                seed.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in seed {
            blackboard.set(&key, value);
        }

        let mut builder = GraphRunner::builder(child_graph, ctx.adapter.clone())
            .library(library)
            .services(ctx.services.clone())
            .scope(scope)
            .blackboard(blackboard);
        if let Some(entity) = &ctx.entity_id {
            builder = builder.entity(entity.clone());
        }
        let runner = builder.build();
        let handle = runner.run().await;

        // Parent cancellation tears the child down through the signal.
        let forwarded = handle.clone();
        let subscription = ctx.signal.subscribe(move |event| {
            if matches!(event, SignalEvent::Cancelled { .. }) {
                forwarded.cancel(Some("parent run cancelled"));
            }
        });
        if ctx.signal.is_cancelled() {
            handle.cancel(Some("parent run cancelled"));
        }

        if !self.config.await_completion {
            return Ok(NodeResult::success().with_transition(Transition::to("next")));
        }

        let status = handle.await_completion().await;
        ctx.signal.unsubscribe(subscription);

        if status == RunStatus::Failed || handle.node_failures() > 0 {
            return Ok(NodeResult::failure(format!("subgraph '{}' failed", graph_id)));
        }
        if status == RunStatus::Cancelled {
            return Ok(NodeResult::cancelled());
        }
        Ok(NodeResult::success().with_transition(Transition::to("next")))
    }
}
