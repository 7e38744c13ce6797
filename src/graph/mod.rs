//! Graph hydration: turn a serialized [`GraphAsset`] into the immutable
//! runtime form the scheduler consumes.
//!
//! Hydration constructs one node instance per serialized node (parameters
//! resolved against the registry's descriptors), buckets connections into
//! flow and data adjacency, and resolves the run's roots. It is deterministic
//! and total on well-formed assets; anything else fails with a
//! [`GraphError`].

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::asset::{ConnectionKind, GraphAsset, RootSpec, SerializedNode};
use crate::error::GraphError;
use crate::nodes::behavior::NodeBehavior;
use crate::nodes::registry::{NodeDefinition, NodeRegistry};

/// A hydrated node: a live instance plus everything the scheduler needs to
/// route around it.
pub struct GraphNode {
    pub id: String,
    pub node_type: String,
    pub entity_id: Option<String>,
    pub instance: Arc<dyn NodeBehavior>,
    pub definition: Arc<NodeDefinition>,
    pub literal_inputs: HashMap<String, Value>,
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("entity_id", &self.entity_id)
            .field("definition", &self.definition)
            .field("literal_inputs", &self.literal_inputs)
            .finish()
    }
}

/// One data connection, kept in asset insertion order so later bindings on
/// the same input pin win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBinding {
    pub to_pin: String,
    pub from_node: String,
    pub from_pin: String,
}

/// Immutable hydrated form of one graph asset, valid for a single run.
#[derive(Debug)]
pub struct HydratedGraph {
    id: String,
    name: String,
    nodes: HashMap<String, GraphNode>,
    flow: HashMap<(String, String), Vec<String>>,
    data: HashMap<String, Vec<DataBinding>>,
    roots: Vec<String>,
}

impl HydratedGraph {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, node_id: &str) -> Option<&GraphNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Flow targets of `(node, pin)` in connection order.
    pub fn flow_targets(&self, node_id: &str, pin_id: &str) -> &[String] {
        self.flow
            .get(&(node_id.to_string(), pin_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Data connections feeding a node's input pins, in connection order.
    pub fn data_bindings(&self, node_id: &str) -> &[DataBinding] {
        self.data.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Hydrate an asset against a registry.
pub fn hydrate(asset: &GraphAsset, registry: &NodeRegistry) -> Result<HydratedGraph, GraphError> {
    let mut nodes: HashMap<String, GraphNode> = HashMap::new();

    for serialized in &asset.nodes {
        if nodes.contains_key(&serialized.id) {
            return Err(GraphError::DuplicateNode(serialized.id.clone()));
        }
        let kind = registry
            .get(&serialized.node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(serialized.node_type.clone()))?;

        let params = resolve_params(&kind.definition, serialized);
        let instance: Arc<dyn NodeBehavior> = Arc::from(kind.construct(&params)?);

        nodes.insert(
            serialized.id.clone(),
            GraphNode {
                id: serialized.id.clone(),
                node_type: serialized.node_type.clone(),
                entity_id: serialized.entity_id.clone(),
                instance,
                definition: kind.definition.clone(),
                literal_inputs: serialized
                    .inputs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            },
        );
    }

    let mut flow: HashMap<(String, String), Vec<String>> = HashMap::new();
    let mut data: HashMap<String, Vec<DataBinding>> = HashMap::new();
    let mut flow_targets: HashSet<String> = HashSet::new();

    for connection in &asset.connections {
        for endpoint in [&connection.from.node_id, &connection.to.node_id] {
            if !nodes.contains_key(endpoint) {
                return Err(GraphError::DanglingConnection(endpoint.clone()));
            }
        }
        match connection.kind {
            ConnectionKind::Flow => {
                flow.entry((
                    connection.from.node_id.clone(),
                    connection.from.pin_id.clone(),
                ))
                .or_default()
                .push(connection.to.node_id.clone());
                flow_targets.insert(connection.to.node_id.clone());
            }
            ConnectionKind::Data => {
                data.entry(connection.to.node_id.clone())
                    .or_default()
                    .push(DataBinding {
                        to_pin: connection.to.pin_id.clone(),
                        from_node: connection.from.node_id.clone(),
                        from_pin: connection.from.pin_id.clone(),
                    });
            }
        }
    }

    let roots = resolve_roots(asset, &nodes, &flow_targets)?;

    Ok(HydratedGraph {
        id: asset.id.clone(),
        name: asset.name.clone(),
        nodes,
        flow,
        data,
        roots,
    })
}

/// Effective parameter map: declared parameters resolved against the
/// serialized `params`, falling back to descriptor defaults; undeclared keys
/// pass through untouched.
fn resolve_params(
    definition: &NodeDefinition,
    serialized: &SerializedNode,
) -> serde_json::Map<String, Value> {
    let mut params = serialized.params.clone();
    for descriptor in &definition.parameters {
        if params.contains_key(&descriptor.id) {
            continue;
        }
        if let Some(default) = &descriptor.default_value {
            params.insert(descriptor.id.clone(), default.clone());
        }
    }
    params
}

fn resolve_roots(
    asset: &GraphAsset,
    nodes: &HashMap<String, GraphNode>,
    flow_targets: &HashSet<String>,
) -> Result<Vec<String>, GraphError> {
    let declared: Vec<String> = match &asset.root {
        RootSpec::One(id) => vec![id.clone()],
        RootSpec::Many(ids) => ids.clone(),
        RootSpec::Unspecified => {
            // Nodes with no inbound flow connection, in asset order; the
            // first node when every node is a flow target.
            let computed: Vec<String> = asset
                .nodes
                .iter()
                .filter(|n| !flow_targets.contains(&n.id))
                .map(|n| n.id.clone())
                .collect();
            if computed.is_empty() {
                return Ok(asset.nodes.first().map(|n| vec![n.id.clone()]).unwrap_or_default());
            }
            return Ok(computed);
        }
    };
    for id in &declared {
        if !nodes.contains_key(id) {
            return Err(GraphError::UnknownNode(id.clone()));
        }
    }
    Ok(declared)
}
