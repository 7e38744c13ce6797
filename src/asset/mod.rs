//! Serialized graph asset model.
//!
//! The on-disk shape authored by graph editors: nodes, typed pin connections,
//! optional roots, camelCase keys. Values carried on data pins are opaque to
//! the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A complete authored graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphAsset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "RootSpec::is_unspecified")]
    pub root: RootSpec,
    pub nodes: Vec<SerializedNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl GraphAsset {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Declared entry points of a graph. When unspecified, roots are computed at
/// hydration as the nodes with no inbound flow connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RootSpec {
    #[default]
    Unspecified,
    One(String),
    Many(Vec<String>),
}

impl RootSpec {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, RootSpec::Unspecified)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    /// Static values bound to declared parameters at hydration.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
    /// Literal input-pin values, used when no data connection supplies one.
    #[serde(default)]
    pub inputs: serde_json::Map<String, Value>,
    /// Overrides the run's default entity for this node and its continuation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Flow,
    Data,
}

/// One endpoint of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRef {
    pub node_id: String,
    pub pin_id: String,
}

impl PinRef {
    pub fn new(node_id: impl Into<String>, pin_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            pin_id: pin_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub kind: ConnectionKind,
    pub from: PinRef,
    pub to: PinRef,
}

impl Connection {
    pub fn flow(from: PinRef, to: PinRef) -> Self {
        Self {
            kind: ConnectionKind::Flow,
            from,
            to,
        }
    }

    pub fn data(from: PinRef, to: PinRef) -> Self {
        Self {
            kind: ConnectionKind::Data,
            from,
            to,
        }
    }
}
