//! Configuration-level error types.

use thiserror::Error;

/// Errors raised while hydrating a graph asset or resolving graphs and node
/// kinds from their registries. These abort the operation that produced them.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("Connection references missing node: {0}")]
    DanglingConnection(String),
    #[error("Graph not found in library: {0}")]
    GraphNotFound(String),
    #[error("Invalid parameters for node type {node_type}: {message}")]
    InvalidParams { node_type: String, message: String },
}
