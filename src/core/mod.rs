//! Execution core: signal, stores, context, events, and the fiber scheduler.

pub mod context;
pub mod event_bus;
pub mod handle;
pub mod runner;
pub mod scope;
pub mod signal;

pub use context::ExecutionContext;
pub use event_bus::{run_event_channel, EventEmitter, RunEvent, RunEventReceiver, RunEventSender};
pub use handle::RunHandle;
pub use runner::{FastForwardRule, GraphRunner, GraphRunnerBuilder, RunConfig, RunStatus};
pub use scope::{Blackboard, Scope};
pub use signal::{RunSignal, SignalEvent, SubscriptionId};
