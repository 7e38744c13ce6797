//! On-event node: subscribes to a gateway event and spawns an ephemeral run
//! of a configured graph for every emission.
//!
//! The node holds its fiber until the enclosing run is cancelled; teardown
//! releases the subscription and reports a `cancelled` result.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;

use super::behavior::{NodeBehavior, NodeResult};
use super::registry::{NodeDefinition, ParameterDescriptor, PinDescriptor};
use crate::core::context::ExecutionContext;
use crate::core::runner::GraphRunner;
use crate::core::scope::Blackboard;
use crate::error::{GraphError, NodeError};
use crate::host::GraphLibrary;
use std::sync::Arc;

pub fn definition() -> NodeDefinition {
    NodeDefinition::new("on-event")
        .with_label("On Event")
        .with_pin(PinDescriptor::flow_in("in"))
        .with_parameter(ParameterDescriptor::new("event"))
        .with_parameter(ParameterDescriptor::new("graphId"))
        .with_parameter(ParameterDescriptor::new("gatewayKey"))
        .with_parameter(ParameterDescriptor::new("payloadKey"))
        .with_parameter(ParameterDescriptor::with_default(
            "isolateBlackboard",
            serde_json::json!(false),
        ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnEventConfig {
    pub event: Option<String>,
    pub graph_id: Option<String>,
    /// Capability key resolved against services; falls back to the
    /// well-known events slot.
    pub gateway_key: Option<String>,
    /// Blackboard variable the payload is bound under in the child run.
    pub payload_key: Option<String>,
    pub isolate_blackboard: bool,
}

pub struct OnEventNode {
    config: OnEventConfig,
}

impl OnEventNode {
    pub fn from_config(config: OnEventConfig) -> Self {
        Self { config }
    }

    async fn spawn_child(
        &self,
        ctx: &ExecutionContext,
        library: &Arc<dyn GraphLibrary>,
        graph_id: &str,
        payload: Value,
    ) -> Result<(), GraphError> {
        let child_graph = library.instantiate(graph_id)?;
        let blackboard = if self.config.isolate_blackboard {
            Blackboard::new()
        } else {
            ctx.blackboard.clone()
        };
        if let Some(key) = &self.config.payload_key {
            blackboard.set(key, payload);
        }
        let mut builder = GraphRunner::builder(child_graph, ctx.adapter.clone())
            .library(library.clone())
            .services(ctx.services.clone())
            .blackboard(blackboard);
        if let Some(entity) = &ctx.entity_id {
            builder = builder.entity(entity.clone());
        }
        // Ephemeral fire-and-forget run with fresh scope.
        let runner = builder.build();
        runner.run().await;
        Ok(())
    }
}

#[async_trait]
impl NodeBehavior for OnEventNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        let Some(event) = self.config.event.as_deref() else {
            return Ok(NodeResult::failure("on-event requires an event name"));
        };
        let Some(graph_id) = self.config.graph_id.as_deref() else {
            return Ok(NodeResult::failure("on-event requires a graph id"));
        };
        let Some(library) = ctx.library.clone() else {
            return Ok(NodeResult::failure("on-event requires a graph library"));
        };
        let Some(gateway) = ctx.services.gateway(self.config.gateway_key.as_deref()) else {
            return Ok(NodeResult::failure("on-event found no event gateway"));
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let unsubscribe = gateway.on(
            event,
            Box::new(move |payload| {
                let _ = tx.send(payload);
            }),
        );

        loop {
            tokio::select! {
                _ = ctx.signal.cancelled() => break,
                received = rx.recv() => {
                    let Some(payload) = received else { break };
                    if let Err(error) = self.spawn_child(ctx, &library, graph_id, payload).await {
                        tracing::warn!(%error, graph_id, "event-spawned run could not start");
                    }
                }
            }
        }

        unsubscribe();
        Ok(NodeResult::cancelled())
    }
}
