//! Error types for the graph engine.
//!
//! - [`GraphError`] — Configuration errors: hydration, registry lookup, library lookup.
//! - [`NodeError`] — Errors raised during individual node execution; fiber-fatal.
//! - [`RunError`] — Errors that abort a fiber and fail the run.
//! - [`HostError`] — Faults reported by the host adapter.

pub mod graph_error;
pub mod node_error;
pub mod run_error;

pub use graph_error::GraphError;
pub use node_error::NodeError;
pub use run_error::RunError;

use thiserror::Error;

/// A fault reported by the host adapter while resolving entities, components,
/// or executing an action on the engine's behalf.
#[derive(Debug, Clone, Error)]
#[error("host fault: {0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        HostError(message.into())
    }
}
