//! Node-level error types.
//!
//! A node returns `Err(NodeError)` only for faults that should tear the run
//! down (host rejections, broken invariants). Recoverable conditions such as
//! a missing parameter or an unknown subgraph id are reported as a `failure`
//! result instead and carry a human-readable message.

use super::HostError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NodeError {
    #[error("Node config error: {0}")]
    Config(String),
    #[error("Node execution error: {0}")]
    Execution(String),
    #[error(transparent)]
    Host(#[from] HostError),
}
