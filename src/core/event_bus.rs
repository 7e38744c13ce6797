//! Run events, delivered over a bounded channel to whoever asked for them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::core::runner::RunStatus;
use crate::nodes::behavior::NodeStatus;

/// Lifecycle events emitted while a run executes.
#[derive(Debug, Clone, Serialize)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        graph_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        node_id: String,
        node_type: String,
        entity_id: Option<String>,
    },
    NodeFinished {
        node_id: String,
        status: NodeStatus,
    },
    FiberSpawned {
        first_node: String,
    },
    RunFinished {
        run_id: String,
        status: RunStatus,
        timestamp: DateTime<Utc>,
    },
}

pub type RunEventSender = mpsc::Sender<RunEvent>;
pub type RunEventReceiver = mpsc::Receiver<RunEvent>;

pub fn run_event_channel(capacity: usize) -> (RunEventSender, RunEventReceiver) {
    mpsc::channel(capacity)
}

/// Sender wrapper with an atomic active flag so emission is cheaply skipped
/// when no listener is attached. Goes inactive for good once the receiver is
/// dropped.
#[derive(Clone)]
pub struct EventEmitter {
    tx: Option<RunEventSender>,
    active: Arc<AtomicBool>,
}

impl EventEmitter {
    pub fn new(tx: RunEventSender) -> Self {
        Self {
            tx: Some(tx),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Emitter that drops every event.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub async fn emit(&self, event: RunEvent) {
        if !self.is_active() {
            return;
        }
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                self.active.store(false, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emitter_delivers_while_active() {
        let (tx, mut rx) = run_event_channel(8);
        let emitter = EventEmitter::new(tx);
        assert!(emitter.is_active());
        emitter
            .emit(RunEvent::FiberSpawned {
                first_node: "a".into(),
            })
            .await;
        assert!(matches!(
            rx.recv().await,
            Some(RunEvent::FiberSpawned { first_node }) if first_node == "a"
        ));
    }

    #[tokio::test]
    async fn test_emitter_deactivates_on_closed_receiver() {
        let (tx, rx) = run_event_channel(1);
        drop(rx);
        let emitter = EventEmitter::new(tx);
        emitter
            .emit(RunEvent::FiberSpawned {
                first_node: "a".into(),
            })
            .await;
        assert!(!emitter.is_active());
    }

    #[tokio::test]
    async fn test_disabled_emitter_is_inert() {
        let emitter = EventEmitter::disabled();
        assert!(!emitter.is_active());
        emitter
            .emit(RunEvent::FiberSpawned {
                first_node: "x".into(),
            })
            .await;
    }
}
