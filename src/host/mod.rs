//! Interfaces the engine consumes from its host.
//!
//! The runner never inspects entities or components itself; everything goes
//! through a [`HostAdapter`]. Graph-spawning nodes resolve other graphs
//! through a [`GraphLibrary`], and probe [`Services`] for optional
//! capabilities such as an [`EventGateway`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::asset::GraphAsset;
use crate::error::{GraphError, HostError};
use crate::graph::HydratedGraph;
use crate::nodes::registry::NodeRegistry;

/// Bridge to the host's entity/component world.
#[async_trait]
pub trait HostAdapter: Send + Sync {
    async fn entity(&self, entity_id: &str) -> Result<Value, HostError>;

    async fn component(
        &self,
        entity_id: &str,
        component_type: &str,
    ) -> Result<Option<Value>, HostError>;

    /// Execute an action on a component. The engine delegates entirely; the
    /// returned value is opaque to it.
    async fn invoke_action(
        &self,
        entity_id: &str,
        component_type: &str,
        action_id: &str,
        args: &[Value],
    ) -> Result<Value, HostError>;
}

/// Adapter that rejects every call. Placeholder for runs whose graphs never
/// touch the host.
pub struct NullHostAdapter;

#[async_trait]
impl HostAdapter for NullHostAdapter {
    async fn entity(&self, entity_id: &str) -> Result<Value, HostError> {
        Err(HostError::new(format!("no host bound (entity {})", entity_id)))
    }

    async fn component(
        &self,
        entity_id: &str,
        component_type: &str,
    ) -> Result<Option<Value>, HostError> {
        Err(HostError::new(format!(
            "no host bound ({}/{})",
            entity_id, component_type
        )))
    }

    async fn invoke_action(
        &self,
        entity_id: &str,
        component_type: &str,
        action_id: &str,
        _args: &[Value],
    ) -> Result<Value, HostError> {
        Err(HostError::new(format!(
            "no host bound ({}/{}/{})",
            entity_id, component_type, action_id
        )))
    }
}

/// Named collection of graph assets the subgraph and event nodes draw from.
pub trait GraphLibrary: Send + Sync {
    fn asset(&self, graph_id: &str) -> Result<Arc<GraphAsset>, GraphError>;

    /// Hydrate a fresh instance of the named graph.
    fn instantiate(&self, graph_id: &str) -> Result<HydratedGraph, GraphError>;
}

/// [`GraphLibrary`] backed by a map of assets and a shared node registry.
pub struct InMemoryLibrary {
    registry: Arc<NodeRegistry>,
    assets: HashMap<String, Arc<GraphAsset>>,
}

impl InMemoryLibrary {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            assets: HashMap::new(),
        }
    }

    pub fn insert(&mut self, asset: GraphAsset) {
        self.assets.insert(asset.id.clone(), Arc::new(asset));
    }

    pub fn with_asset(mut self, asset: GraphAsset) -> Self {
        self.insert(asset);
        self
    }
}

impl GraphLibrary for InMemoryLibrary {
    fn asset(&self, graph_id: &str) -> Result<Arc<GraphAsset>, GraphError> {
        self.assets
            .get(graph_id)
            .cloned()
            .ok_or_else(|| GraphError::GraphNotFound(graph_id.to_string()))
    }

    fn instantiate(&self, graph_id: &str) -> Result<HydratedGraph, GraphError> {
        let asset = self.asset(graph_id)?;
        crate::graph::hydrate(&asset, &self.registry)
    }
}

/// Listener invoked with the event payload on each emission.
pub type EventListener = Box<dyn Fn(Value) + Send + Sync>;
/// Releases the subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// External event source nodes can subscribe to.
pub trait EventGateway: Send + Sync {
    fn on(&self, event: &str, listener: EventListener) -> Unsubscribe;
}

/// Capability container handed through to node contexts. The engine imposes
/// no schema; nodes probe for what they need.
#[derive(Clone, Default)]
pub struct Services {
    events: Option<Arc<dyn EventGateway>>,
    gateways: HashMap<String, Arc<dyn EventGateway>>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the well-known events slot.
    pub fn with_events(mut self, gateway: Arc<dyn EventGateway>) -> Self {
        self.events = Some(gateway);
        self
    }

    /// Bind a gateway under an explicit capability key.
    pub fn with_gateway(mut self, key: impl Into<String>, gateway: Arc<dyn EventGateway>) -> Self {
        self.gateways.insert(key.into(), gateway);
        self
    }

    /// Resolve a gateway by key, falling back to the well-known events slot.
    pub fn gateway(&self, key: Option<&str>) -> Option<Arc<dyn EventGateway>> {
        match key {
            Some(key) => self
                .gateways
                .get(key)
                .cloned()
                .or_else(|| self.events.clone()),
            None => self.events.clone(),
        }
    }
}
