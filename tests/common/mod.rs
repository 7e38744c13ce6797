//! Shared fixtures for runner integration tests: probe nodes that record
//! their invocations, a failing node, a recording host adapter, and an
//! in-process event gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use fiberflow::{
    EventGateway, EventListener, ExecutionContext, GraphAsset, HostAdapter, HostError,
    HydratedGraph, NodeBehavior, NodeDefinition, NodeError, NodeRegistry, NodeResult,
    ParameterDescriptor, PinDescriptor, Unsubscribe,
};

/// One recorded node invocation.
#[derive(Debug, Clone)]
pub struct ProbeHit {
    pub node: String,
    pub inputs: HashMap<String, Value>,
}

pub type ProbeLog = Arc<Mutex<Vec<ProbeHit>>>;

pub fn new_log() -> ProbeLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Node ids in invocation order.
pub fn hit_order(log: &ProbeLog) -> Vec<String> {
    log.lock().iter().map(|hit| hit.node.clone()).collect()
}

pub fn hits_for(log: &ProbeLog, node: &str) -> Vec<ProbeHit> {
    log.lock()
        .iter()
        .filter(|hit| hit.node == node)
        .cloned()
        .collect()
}

/// Records every invocation and emits its configured `value` parameter on
/// pin `v`.
struct ProbeNode {
    log: ProbeLog,
    value: Option<Value>,
}

#[async_trait]
impl NodeBehavior for ProbeNode {
    async fn on_execute(&self, ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        self.log.lock().push(ProbeHit {
            node: ctx.node_id.clone(),
            inputs: ctx.inputs.clone(),
        });
        let mut result = NodeResult::success();
        if let Some(value) = &self.value {
            result = result.with_output("v", value.clone());
        }
        Ok(result)
    }
}

/// Always reports a `failure` result.
struct FailNode;

#[async_trait]
impl NodeBehavior for FailNode {
    async fn on_execute(&self, _ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::failure("boom"))
    }
}

/// Always returns a hard error, which is fatal to the fiber.
struct ExplodeNode;

#[async_trait]
impl NodeBehavior for ExplodeNode {
    async fn on_execute(&self, _ctx: &ExecutionContext) -> Result<NodeResult, NodeError> {
        Err(NodeError::Execution("kaboom".into()))
    }
}

/// Built-in registry extended with the test nodes, wired to `log`.
pub fn test_registry(log: &ProbeLog) -> NodeRegistry {
    let mut registry = NodeRegistry::new();

    let probe_log = log.clone();
    registry.register(
        NodeDefinition::new("probe")
            .with_default_output("next")
            .with_pin(PinDescriptor::flow_in("in"))
            .with_pin(PinDescriptor::data_out("v"))
            .with_pin(PinDescriptor::flow_out("next"))
            .with_parameter(ParameterDescriptor::new("value")),
        Box::new(move |params| {
            Ok(Box::new(ProbeNode {
                log: probe_log.clone(),
                value: params.get("value").cloned(),
            }))
        }),
    );

    registry.register(
        NodeDefinition::new("fail").with_pin(PinDescriptor::flow_in("in")),
        Box::new(|_| Ok(Box::new(FailNode))),
    );

    registry.register(
        NodeDefinition::new("explode").with_pin(PinDescriptor::flow_in("in")),
        Box::new(|_| Ok(Box::new(ExplodeNode))),
    );

    registry
}

pub fn hydrate_json(asset: Value, registry: &NodeRegistry) -> HydratedGraph {
    let asset = GraphAsset::from_value(asset).expect("asset should parse");
    fiberflow::hydrate(&asset, registry).expect("asset should hydrate")
}

/// Host adapter recording every action invocation.
#[derive(Default)]
pub struct MockAdapter {
    pub calls: Mutex<Vec<(String, String, String, Vec<Value>)>>,
}

#[async_trait]
impl HostAdapter for MockAdapter {
    async fn entity(&self, entity_id: &str) -> Result<Value, HostError> {
        Ok(serde_json::json!({ "id": entity_id }))
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
        Ok(serde_json::json!("ok"))
    }
}

/// In-process gateway: tests emit events, subscribed listeners fire inline.
#[derive(Default)]
pub struct TestGateway {
    listeners: Arc<Mutex<HashMap<String, HashMap<u64, EventListener>>>>,
    next_id: Mutex<u64>,
}

impl TestGateway {
    pub fn emit(&self, event: &str, payload: Value) {
        let listeners = self.listeners.lock();
        if let Some(subscribed) = listeners.get(event) {
            for listener in subscribed.values() {
                listener(payload.clone());
            }
        }
    }
}

impl EventGateway for TestGateway {
    fn on(&self, event: &str, listener: EventListener) -> Unsubscribe {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .insert(id, listener);

        let listeners = self.listeners.clone();
        let event = event.to_string();
        Box::new(move || {
            if let Some(subscribed) = listeners.lock().get_mut(&event) {
                subscribed.remove(&id);
            }
        })
    }
}
