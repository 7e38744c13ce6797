//! Node protocol, registry of node kinds, and the built-in control nodes.

pub mod behavior;
pub mod registry;

pub mod branch;
pub mod delay;
pub mod invoke_action;
pub mod loop_node;
pub mod on_event;
pub mod parallel;
pub mod start;
pub mod subgraph;
pub mod variable;
pub mod wait_for;

pub use behavior::{NodeBehavior, NodeResult, NodeStatus, Strategy, Transition, WaitFor};
pub use registry::{
    NodeDefinition, NodeKind, NodeRegistry, ParameterDescriptor, PinDescriptor, PinDirection,
    PinSignal,
};
