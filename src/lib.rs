//! fiberflow — a runtime engine for visual flow/data graphs.
//!
//! Authored graph assets describe nodes connected by typed pins: `flow` pins
//! sequence execution, `data` pins carry values. The engine hydrates an
//! asset against a registry of node kinds, then schedules it as cooperative
//! *fibers* (logical execution lanes with FIFO queues) against a host
//! entity/component world reached through an adapter.
//!
//! ```no_run
//! use fiberflow::{hydrate, GraphAsset, GraphRunner, NodeRegistry, NullHostAdapter};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = NodeRegistry::new();
//! let asset = GraphAsset::from_json_str(r#"{
//!     "id": "hello",
//!     "nodes": [
//!         {"id": "start", "type": "start"},
//!         {"id": "pause", "type": "delay", "params": {"durationMs": 100}}
//!     ],
//!     "connections": [
//!         {"kind": "flow", "from": {"nodeId": "start", "pinId": "next"},
//!          "to": {"nodeId": "pause", "pinId": "in"}}
//!     ]
//! }"#)?;
//!
//! let graph = hydrate(&asset, &registry)?;
//! let runner = GraphRunner::builder(graph, Arc::new(NullHostAdapter)).build();
//! let handle = runner.run().await;
//! let status = handle.await_completion().await;
//! println!("finished: {:?} scope: {:?}", status, handle.scope_snapshot());
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod core;
pub mod error;
pub mod graph;
pub mod host;
pub mod nodes;

pub use crate::asset::{Connection, ConnectionKind, GraphAsset, PinRef, RootSpec, SerializedNode};
pub use crate::core::{
    run_event_channel, Blackboard, EventEmitter, ExecutionContext, GraphRunner,
    GraphRunnerBuilder, RunConfig, RunEvent, RunEventReceiver, RunEventSender, RunHandle,
    RunSignal, RunStatus, Scope, SignalEvent, SubscriptionId,
};
pub use crate::error::{GraphError, HostError, NodeError, RunError};
pub use crate::graph::{hydrate, DataBinding, GraphNode, HydratedGraph};
pub use crate::host::{
    EventGateway, EventListener, GraphLibrary, HostAdapter, InMemoryLibrary, NullHostAdapter,
    Services, Unsubscribe,
};
pub use crate::nodes::{
    NodeBehavior, NodeDefinition, NodeRegistry, NodeResult, NodeStatus, ParameterDescriptor,
    PinDescriptor, PinDirection, PinSignal, Strategy, Transition, WaitFor,
};
