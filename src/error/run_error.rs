//! Run-level error types.

use super::{GraphError, NodeError};
use thiserror::Error;

/// Errors that abort a fiber. The runner logs them, flips the run to
/// `failed`, and cancels the signal to tear down sibling fibers.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("Node '{node_id}' failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: NodeError,
    },
    #[error("Scheduled node does not exist: {0}")]
    UnknownNode(String),
    #[error("Wait target does not exist: {0}")]
    UnknownWaitTarget(String),
    #[error("Fiber exceeded step limit of {0}")]
    MaxStepsExceeded(u32),
    #[error(transparent)]
    Graph(#[from] GraphError),
}
