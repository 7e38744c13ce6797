//! The graph runner: fiber scheduling, transition routing, completion
//! bookkeeping, and terminal-state selection.
//!
//! A *fiber* is a cooperative execution lane: a tokio task draining a FIFO
//! queue of work items. The runner spawns one fiber per root; `parallel`
//! transitions spawn more. Fibers share one [`RunCore`]: the hydrated graph,
//! the scope and blackboard, the run signal, completion counts with their
//! waiters, and the fast-forward target set.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;

use crate::core::context::ExecutionContext;
use crate::core::event_bus::{EventEmitter, RunEvent, RunEventSender};
use crate::core::handle::RunHandle;
use crate::core::scope::{Blackboard, Scope};
use crate::core::signal::RunSignal;
use crate::error::RunError;
use crate::graph::{GraphNode, HydratedGraph};
use crate::host::{GraphLibrary, HostAdapter, Services};
use crate::nodes::behavior::{NodeResult, NodeStatus, Strategy, Transition, WaitFor};

/// Lifecycle of one run. Terminal states are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed
        )
    }
}

/// Per-run limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    /// Safety valve against runaway cycles: maximum node invocations per
    /// fiber. `None` leaves termination to node state, which is the normal
    /// mode for authored loops.
    #[serde(default)]
    pub max_steps: Option<u32>,
}

/// Predicate selecting nodes for fast-forward by id and type.
pub type FastForwardRule = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

#[derive(Default)]
pub(crate) struct FastForwardTargets {
    ids: HashSet<String>,
    rules: Vec<FastForwardRule>,
}

impl FastForwardTargets {
    pub(crate) fn add_node(&mut self, node_id: &str) {
        self.ids.insert(node_id.to_string());
    }

    pub(crate) fn add_rule(&mut self, rule: FastForwardRule) {
        self.rules.push(rule);
    }

    fn matches(&self, node_id: &str, node_type: &str) -> bool {
        self.ids.contains(node_id) || self.rules.iter().any(|rule| rule(node_id, node_type))
    }
}

struct Waiter {
    target_count: u64,
    notify: oneshot::Sender<()>,
}

/// Completion counts and the waiters keyed on them. One lock covers both so
/// that incrementing a count and waking its waiters is atomic.
#[derive(Default)]
pub(crate) struct CompletionBook {
    counts: HashMap<String, u64>,
    waiters: HashMap<String, Vec<Waiter>>,
}

impl CompletionBook {
    pub(crate) fn completions(&self, node_id: &str) -> u64 {
        self.counts.get(node_id).copied().unwrap_or(0)
    }

    /// Register a waiter unless the wait is already satisfied, in which case
    /// no receiver is handed back and the caller proceeds without
    /// suspending.
    fn register(&mut self, node_id: &str, next_completion: bool) -> Option<oneshot::Receiver<()>> {
        let completed = self.completions(node_id);
        let target_count = if next_completion { completed + 1 } else { 1 };
        if completed >= target_count {
            return None;
        }
        let (notify, receiver) = oneshot::channel();
        self.waiters
            .entry(node_id.to_string())
            .or_default()
            .push(Waiter {
                target_count,
                notify,
            });
        Some(receiver)
    }

    fn mark_completed(&mut self, node_id: &str) -> u64 {
        let count = self.counts.entry(node_id.to_string()).or_insert(0);
        *count += 1;
        let reached = *count;
        if let Some(waiters) = self.waiters.get_mut(node_id) {
            let mut kept = Vec::new();
            for waiter in waiters.drain(..) {
                if waiter.target_count <= reached {
                    let _ = waiter.notify.send(());
                } else {
                    kept.push(waiter);
                }
            }
            *waiters = kept;
        }
        reached
    }

    fn resolve_all(&mut self) {
        for (_, waiters) in self.waiters.drain() {
            for waiter in waiters {
                let _ = waiter.notify.send(());
            }
        }
    }
}

/// One queued node invocation. The entity id is resolved at enqueue time:
/// the target node's own entity, else the enqueuing fiber's.
#[derive(Debug, Clone)]
struct WorkItem {
    node_id: String,
    entity_id: Option<String>,
}

/// State shared by the runner, its fibers, and every handle.
pub(crate) struct RunCore {
    pub(crate) run_id: String,
    pub(crate) graph: Arc<HydratedGraph>,
    pub(crate) scope: Scope,
    pub(crate) blackboard: Blackboard,
    pub(crate) signal: RunSignal,
    adapter: Arc<dyn HostAdapter>,
    library: Option<Arc<dyn GraphLibrary>>,
    services: Services,
    default_entity: Option<String>,
    config: RunConfig,
    emitter: EventEmitter,
    pub(crate) completions: parking_lot::Mutex<CompletionBook>,
    pub(crate) fast_forward: parking_lot::Mutex<FastForwardTargets>,
    fiber_failed: AtomicBool,
    node_failures: AtomicU32,
    fibers_live: AtomicUsize,
    idle_notify: Notify,
    status_tx: watch::Sender<RunStatus>,
}

impl RunCore {
    /// Latch cancellation and release every blocked fiber. A runner with no
    /// fibers started jumps straight to the terminal state.
    pub(crate) fn cancel(&self, reason: Option<&str>) {
        self.signal.cancel(reason);
        self.completions.lock().resolve_all();
        self.status_tx.send_if_modified(|status| {
            if *status == RunStatus::Idle {
                *status = RunStatus::Cancelled;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn node_failures(&self) -> u32 {
        self.node_failures.load(Ordering::SeqCst)
    }

    fn mark_completed(&self, node_id: &str) {
        self.completions.lock().mark_completed(node_id);
    }

    fn finish(&self, terminal: RunStatus) {
        self.status_tx.send_if_modified(|status| {
            if status.is_terminal() {
                false
            } else {
                *status = terminal;
                true
            }
        });
    }

    fn fast_forward_matches(&self, node_id: &str, node_type: &str) -> bool {
        self.fast_forward.lock().matches(node_id, node_type)
    }

    /// Literal inputs overlaid with the latest scope value of each data
    /// binding; later bindings on the same pin win.
    fn build_inputs(&self, node: &GraphNode) -> HashMap<String, Value> {
        let mut inputs = node.literal_inputs.clone();
        for binding in self.graph.data_bindings(&node.id) {
            if let Some(value) = self.scope.get(&binding.from_node, &binding.from_pin) {
                inputs.insert(binding.to_pin.clone(), value);
            }
        }
        inputs
    }

    fn context_for(
        &self,
        node: &GraphNode,
        entity_id: Option<String>,
        inputs: HashMap<String, Value>,
        fast_forwarded: bool,
    ) -> ExecutionContext {
        ExecutionContext {
            node_id: node.id.clone(),
            entity_id,
            adapter: self.adapter.clone(),
            scope: self.scope.clone(),
            blackboard: self.blackboard.clone(),
            signal: self.signal.clone(),
            inputs,
            library: self.library.clone(),
            services: self.services.clone(),
            fast_forwarded,
        }
    }
}

fn spawn_fiber(core: Arc<RunCore>, first: WorkItem) -> JoinHandle<()> {
    core.fibers_live.fetch_add(1, Ordering::SeqCst);
    tokio::spawn(async move {
        core.emitter
            .emit(RunEvent::FiberSpawned {
                first_node: first.node_id.clone(),
            })
            .await;
        let fiber = Fiber {
            core: core.clone(),
            queue: VecDeque::from([first]),
            steps: 0,
        };
        fiber.run().await;
        if core.fibers_live.fetch_sub(1, Ordering::SeqCst) == 1 {
            core.idle_notify.notify_waiters();
        }
    })
}

struct Fiber {
    core: Arc<RunCore>,
    queue: VecDeque<WorkItem>,
    steps: u32,
}

impl Fiber {
    async fn run(mut self) {
        while !self.core.signal.is_cancelled() {
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            let outcome = self.step(&item).await;
            // Completion is marked on every path, error paths included, so
            // waiters keyed on this node never hang.
            self.core.mark_completed(&item.node_id);
            if let Err(error) = outcome {
                tracing::error!(node_id = %item.node_id, %error, "fiber aborted");
                self.core.fiber_failed.store(true, Ordering::SeqCst);
                self.core.cancel(Some(&error.to_string()));
                break;
            }
        }
    }

    async fn step(&mut self, item: &WorkItem) -> Result<(), RunError> {
        if let Some(max_steps) = self.core.config.max_steps {
            self.steps += 1;
            if self.steps > max_steps {
                return Err(RunError::MaxStepsExceeded(max_steps));
            }
        }

        let graph = self.core.graph.clone();
        let node = graph
            .node(&item.node_id)
            .ok_or_else(|| RunError::UnknownNode(item.node_id.clone()))?;

        let inputs = self.core.build_inputs(node);
        let fast_forwarded = self.core.fast_forward_matches(&node.id, &node.node_type);
        let ctx = self
            .core
            .context_for(node, item.entity_id.clone(), inputs, fast_forwarded);

        self.core
            .emitter
            .emit(RunEvent::NodeStarted {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                entity_id: item.entity_id.clone(),
            })
            .await;

        let result = if fast_forwarded {
            node.instance.on_fast_forward(&ctx).await
        } else {
            node.instance.execute(&ctx).await
        };
        let result = result.map_err(|source| RunError::Node {
            node_id: node.id.clone(),
            source,
        })?;

        if let Some(wait) = &result.wait_for {
            self.await_nodes(wait).await?;
            if self.core.signal.is_cancelled() {
                return Ok(());
            }
        }

        for (pin, value) in &result.outputs {
            self.core.scope.set(&node.id, pin, value.clone());
        }

        if result.status == NodeStatus::Failure {
            self.core.node_failures.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(
                node_id = %node.id,
                error = result.error.as_deref().unwrap_or(""),
                "node reported failure"
            );
        }

        self.core
            .emitter
            .emit(RunEvent::NodeFinished {
                node_id: node.id.clone(),
                status: result.status,
            })
            .await;

        self.route(node, item, &result).await;
        Ok(())
    }

    async fn await_nodes(&self, wait: &WaitFor) -> Result<(), RunError> {
        for node_id in &wait.nodes {
            if !self.core.graph.contains(node_id) {
                return Err(RunError::UnknownWaitTarget(node_id.clone()));
            }
        }
        let mut pending = Vec::new();
        {
            let mut book = self.core.completions.lock();
            for node_id in &wait.nodes {
                if let Some(receiver) = book.register(node_id, wait.next_completion) {
                    pending.push(receiver);
                }
            }
        }
        // A dropped sender counts as resolved; that only happens when the
        // book is torn down with the run.
        let _ = futures::future::join_all(pending).await;
        Ok(())
    }

    async fn route(&mut self, node: &GraphNode, item: &WorkItem, result: &NodeResult) {
        let transitions: Vec<Transition> = match &result.transitions {
            Some(transitions) => transitions.clone(),
            // Only a plain success falls through to the default output; a
            // failure or skip with no explicit transitions routes nothing.
            None if result.status == NodeStatus::Success => node
                .definition
                .default_output
                .as_deref()
                .map(|pin| vec![Transition::to(pin)])
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let mut sequential: Vec<WorkItem> = Vec::new();
        for transition in &transitions {
            let strategy = transition
                .strategy
                .unwrap_or_else(|| node.definition.declared_strategy(&transition.pin));
            for target_id in self.core.graph.flow_targets(&node.id, &transition.pin) {
                let entity_id = self
                    .core
                    .graph
                    .node(target_id)
                    .and_then(|target| target.entity_id.clone())
                    .or_else(|| item.entity_id.clone());
                let work = WorkItem {
                    node_id: target_id.clone(),
                    entity_id,
                };
                match strategy {
                    Strategy::Sequential => sequential.push(work),
                    Strategy::Parallel => {
                        let fiber = spawn_fiber(self.core.clone(), work);
                        if transition.await_completion.unwrap_or(true) {
                            if let Err(error) = fiber.await {
                                tracing::warn!(%error, "forked fiber join failed");
                            }
                        }
                    }
                }
            }
        }
        // Prepend in order: routed targets run before anything already
        // queued behind this node.
        for work in sequential.into_iter().rev() {
            self.queue.push_front(work);
        }
    }
}

/// Builder mirroring the runner's collaborators: adapter, library, services,
/// default entity, stores, events, limits.
pub struct GraphRunnerBuilder {
    graph: HydratedGraph,
    adapter: Arc<dyn HostAdapter>,
    entity: Option<String>,
    library: Option<Arc<dyn GraphLibrary>>,
    services: Services,
    config: RunConfig,
    scope: Scope,
    blackboard: Blackboard,
    events: Option<RunEventSender>,
}

impl GraphRunnerBuilder {
    pub fn entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity = Some(entity_id.into());
        self
    }

    pub fn library(mut self, library: Arc<dyn GraphLibrary>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing scope instead of starting empty. Used by nested
    /// runs that opt into their parent's dataflow.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn blackboard(mut self, blackboard: Blackboard) -> Self {
        self.blackboard = blackboard;
        self
    }

    pub fn events(mut self, tx: RunEventSender) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn build(self) -> GraphRunner {
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);
        let emitter = match self.events {
            Some(tx) => EventEmitter::new(tx),
            None => EventEmitter::disabled(),
        };
        let core = Arc::new(RunCore {
            run_id: uuid::Uuid::new_v4().to_string(),
            graph: Arc::new(self.graph),
            scope: self.scope,
            blackboard: self.blackboard,
            signal: RunSignal::new(),
            adapter: self.adapter,
            library: self.library,
            services: self.services,
            default_entity: self.entity,
            config: self.config,
            emitter,
            completions: parking_lot::Mutex::new(CompletionBook::default()),
            fast_forward: parking_lot::Mutex::new(FastForwardTargets::default()),
            fiber_failed: AtomicBool::new(false),
            node_failures: AtomicU32::new(0),
            fibers_live: AtomicUsize::new(0),
            idle_notify: Notify::new(),
            status_tx,
        });
        GraphRunner {
            core,
            status_rx,
            started: parking_lot::Mutex::new(false),
        }
    }
}

/// Executes one hydrated graph. `run()` starts the fibers exactly once; the
/// returned [`RunHandle`] controls and observes the run.
pub struct GraphRunner {
    core: Arc<RunCore>,
    status_rx: watch::Receiver<RunStatus>,
    started: parking_lot::Mutex<bool>,
}

impl GraphRunner {
    pub fn builder(graph: HydratedGraph, adapter: Arc<dyn HostAdapter>) -> GraphRunnerBuilder {
        GraphRunnerBuilder {
            graph,
            adapter,
            entity: None,
            library: None,
            services: Services::new(),
            config: RunConfig::default(),
            scope: Scope::new(),
            blackboard: Blackboard::new(),
            events: None,
        }
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle::new(self.core.clone(), self.status_rx.clone())
    }

    /// Start the run. On a runner that is not idle this is a no-op returning
    /// a handle to the existing run.
    pub async fn run(&self) -> RunHandle {
        {
            let mut started = self.started.lock();
            if *started || *self.status_rx.borrow() != RunStatus::Idle {
                return self.handle();
            }
            *started = true;
            self.core.status_tx.send_replace(RunStatus::Running);
        }

        let core = self.core.clone();
        core.emitter
            .emit(RunEvent::RunStarted {
                run_id: core.run_id.clone(),
                graph_id: core.graph.id().to_string(),
                timestamp: chrono::Utc::now(),
            })
            .await;

        let roots = core.graph.roots().to_vec();
        if roots.is_empty() {
            core.finish(RunStatus::Completed);
            core.emitter
                .emit(RunEvent::RunFinished {
                    run_id: core.run_id.clone(),
                    status: RunStatus::Completed,
                    timestamp: chrono::Utc::now(),
                })
                .await;
            return self.handle();
        }

        for root in roots {
            let entity_id = core
                .graph
                .node(&root)
                .and_then(|node| node.entity_id.clone())
                .or_else(|| core.default_entity.clone());
            let _ = spawn_fiber(
                core.clone(),
                WorkItem {
                    node_id: root,
                    entity_id,
                },
            );
        }

        let supervisor = core.clone();
        tokio::spawn(async move {
            loop {
                // Register interest before the count check so a decrement
                // landing in between cannot be missed.
                let notified = supervisor.idle_notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if supervisor.fibers_live.load(Ordering::SeqCst) == 0 {
                    break;
                }
                notified.await;
            }
            let terminal = if supervisor.fiber_failed.load(Ordering::SeqCst) {
                RunStatus::Failed
            } else if supervisor.signal.is_cancelled() {
                RunStatus::Cancelled
            } else {
                RunStatus::Completed
            };
            supervisor.finish(terminal);
            supervisor
                .emitter
                .emit(RunEvent::RunFinished {
                    run_id: supervisor.run_id.clone(),
                    status: terminal,
                    timestamp: chrono::Utc::now(),
                })
                .await;
        });

        self.handle()
    }
}
