//! Registry of node kinds.
//!
//! Maps a node-type string to a [`NodeKind`]: a declarative
//! [`NodeDefinition`] (pins, parameters, default output) plus a constructor
//! that builds a fresh instance from resolved parameters. Populated during
//! authoring; read-only once runs start.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::behavior::{NodeBehavior, Strategy};
use crate::error::GraphError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinSignal {
    Flow,
    Data,
}

/// A named endpoint on a node. Output flow pins may declare a default
/// routing strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinDescriptor {
    pub id: String,
    pub direction: PinDirection,
    pub signal: PinSignal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
}

impl PinDescriptor {
    fn new(id: &str, direction: PinDirection, signal: PinSignal) -> Self {
        Self {
            id: id.to_string(),
            direction,
            signal,
            strategy: None,
        }
    }

    pub fn flow_in(id: &str) -> Self {
        Self::new(id, PinDirection::In, PinSignal::Flow)
    }

    pub fn flow_out(id: &str) -> Self {
        Self::new(id, PinDirection::Out, PinSignal::Flow)
    }

    pub fn data_in(id: &str) -> Self {
        Self::new(id, PinDirection::In, PinSignal::Data)
    }

    pub fn data_out(id: &str) -> Self {
        Self::new(id, PinDirection::Out, PinSignal::Data)
    }

    pub fn parallel(mut self) -> Self {
        self.strategy = Some(Strategy::Parallel);
        self
    }
}

/// A declared per-node parameter, bound once at hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

impl ParameterDescriptor {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            default_value: None,
        }
    }

    pub fn with_default(id: &str, value: Value) -> Self {
        Self {
            id: id.to_string(),
            default_value: Some(value),
        }
    }
}

/// Declarative description of one node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Output pin used to route the continuation when a successful result
    /// carries no explicit transitions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_output: Option<String>,
    #[serde(default)]
    pub pins: Vec<PinDescriptor>,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

impl NodeDefinition {
    pub fn new(node_type: &str) -> Self {
        Self {
            node_type: node_type.to_string(),
            label: None,
            description: None,
            default_output: None,
            pins: Vec::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_default_output(mut self, pin: &str) -> Self {
        self.default_output = Some(pin.to_string());
        self
    }

    pub fn with_pin(mut self, pin: PinDescriptor) -> Self {
        self.pins.push(pin);
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn output_pin(&self, pin_id: &str) -> Option<&PinDescriptor> {
        self.pins
            .iter()
            .find(|p| p.direction == PinDirection::Out && p.id == pin_id)
    }

    /// Declared strategy of an output pin; sequential for undeclared pins
    /// and pins without one.
    pub fn declared_strategy(&self, pin_id: &str) -> Strategy {
        self.output_pin(pin_id)
            .and_then(|p| p.strategy)
            .unwrap_or(Strategy::Sequential)
    }
}

/// Builds a fresh node instance from its resolved parameter map.
pub type NodeConstructor = Box<
    dyn Fn(&serde_json::Map<String, Value>) -> Result<Box<dyn NodeBehavior>, GraphError>
        + Send
        + Sync,
>;

/// A registered node kind: definition plus instance constructor.
pub struct NodeKind {
    pub definition: Arc<NodeDefinition>,
    constructor: NodeConstructor,
}

impl NodeKind {
    pub fn construct(
        &self,
        params: &serde_json::Map<String, Value>,
    ) -> Result<Box<dyn NodeBehavior>, GraphError> {
        (self.constructor)(params)
    }
}

pub struct NodeRegistry {
    kinds: HashMap<String, NodeKind>,
}

impl NodeRegistry {
    /// Registry with the built-in control nodes registered.
    pub fn new() -> Self {
        Self::with_builtins()
    }

    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_node(super::start::definition(), super::start::StartNode::from_config);
        registry.register_node(super::branch::definition(), super::branch::BranchNode::from_config);
        registry.register_node(super::delay::definition(), super::delay::DelayNode::from_config);
        registry.register_node(
            super::parallel::definition(),
            super::parallel::ParallelNode::from_config,
        );
        registry.register_node(
            super::variable::set_definition(),
            super::variable::SetVariableNode::from_config,
        );
        registry.register_node(
            super::variable::get_definition(),
            super::variable::GetVariableNode::from_config,
        );
        registry.register_node(
            super::loop_node::definition(),
            super::loop_node::LoopNode::from_config,
        );
        registry.register_node(
            super::wait_for::definition(),
            super::wait_for::WaitForNodesNode::from_config,
        );
        registry.register_node(
            super::invoke_action::definition(),
            super::invoke_action::InvokeActionNode::from_config,
        );
        registry.register_node(
            super::subgraph::definition(),
            super::subgraph::RunSubgraphNode::from_config,
        );
        registry.register_node(
            super::on_event::definition(),
            super::on_event::OnEventNode::from_config,
        );
        registry
    }

    pub fn register(&mut self, definition: NodeDefinition, constructor: NodeConstructor) {
        self.kinds.insert(
            definition.node_type.clone(),
            NodeKind {
                definition: Arc::new(definition),
                constructor,
            },
        );
    }

    /// Register a kind whose constructor deserializes the resolved params
    /// into a typed config.
    pub fn register_node<C, N, F>(&mut self, definition: NodeDefinition, make: F)
    where
        C: DeserializeOwned,
        N: NodeBehavior + 'static,
        F: Fn(C) -> N + Send + Sync + 'static,
    {
        let node_type = definition.node_type.clone();
        let constructor: NodeConstructor = Box::new(move |params| {
            let config: C =
                serde_json::from_value(Value::Object(params.clone())).map_err(|e| {
                    GraphError::InvalidParams {
                        node_type: node_type.clone(),
                        message: e.to_string(),
                    }
                })?;
            Ok(Box::new(make(config)))
        });
        self.register(definition, constructor);
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeKind> {
        self.kinds.get(node_type)
    }

    pub fn definition(&self, node_type: &str) -> Option<Arc<NodeDefinition>> {
        self.kinds.get(node_type).map(|k| k.definition.clone())
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
