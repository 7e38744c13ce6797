//! Per-invocation view handed to a node.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::scope::{Blackboard, Scope};
use crate::core::signal::RunSignal;
use crate::host::{GraphLibrary, HostAdapter, Services};

/// Everything a node sees while executing: the resolved entity, the run's
/// shared stores and signal, its resolved inputs, and the host collaborators.
#[derive(Clone)]
pub struct ExecutionContext {
    pub node_id: String,
    pub entity_id: Option<String>,
    pub adapter: Arc<dyn HostAdapter>,
    pub scope: Scope,
    pub blackboard: Blackboard,
    pub signal: RunSignal,
    /// Literal inputs overlaid with the latest scope values from data
    /// connections. Later connections on the same pin win.
    pub inputs: HashMap<String, Value>,
    pub library: Option<Arc<dyn GraphLibrary>>,
    pub services: Services,
    /// Set when the run's fast-forward targets matched this node.
    pub fast_forwarded: bool,
}

impl ExecutionContext {
    pub fn new(node_id: impl Into<String>, adapter: Arc<dyn HostAdapter>) -> Self {
        Self {
            node_id: node_id.into(),
            entity_id: None,
            adapter,
            scope: Scope::new(),
            blackboard: Blackboard::new(),
            signal: RunSignal::new(),
            inputs: HashMap::new(),
            library: None,
            services: Services::new(),
            fast_forwarded: false,
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_input(mut self, pin_id: &str, value: Value) -> Self {
        self.inputs.insert(pin_id.to_string(), value);
        self
    }

    pub fn with_signal(mut self, signal: RunSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_library(mut self, library: Arc<dyn GraphLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn input(&self, pin_id: &str) -> Option<&Value> {
        self.inputs.get(pin_id)
    }

    /// Whether this invocation should skip its effectful body: either the
    /// run's fast-forward targets matched the node, or the signal's global
    /// fast-forward latch is set.
    pub fn is_fast_forwarding(&self) -> bool {
        self.fast_forwarded || self.signal.is_fast_forward()
    }
}
