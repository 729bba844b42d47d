//! Execution engine — drives runs and their tokens through rule graphs.
//!
//! A telemetry reading that satisfies a trigger starts a *run*. The run
//! owns one or more *tokens*; each token walks its own linear path as a
//! separate tokio task and forks when a node has several outgoing edges.
//!
//! Mutable run state (run bookkeeping, join slots, delay tickets, join
//! timers) lives in one registry behind a single mutex that is never held
//! across an `.await`. Graphs themselves are immutable and shared through
//! `Arc<Rule>`.
//!
//! Run accounting: a run counts its live tokens, including tokens parked
//! on a delay. A token absorbed by a join leaves the count and the join's
//! pending slot keeps the run alive until it resolves. A run finishes once
//! no token is live and no join is pending; it is `Failed` if any token
//! path failed and `Completed` otherwise.

pub mod action;
pub mod condition;
pub mod delay;
pub mod join;
pub mod trigger;

pub use action::ActionExecutor;
pub use delay::DelayScheduler;
pub use join::{JoinCoordinator, JoinOutcome};
pub use trigger::{TriggerDispatcher, TriggerMatch};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use ruleflow_domain::error::{NotFoundError, RuleflowError};
use ruleflow_domain::execution::{EngineEvent, NodeEvent, NodePhase, RunStatus};
use ruleflow_domain::graph::{
    JoinInput, JoinMode, Node, NodeData, NodeId, NodeIndex, SourcePort, TargetPort,
};
use ruleflow_domain::id::{RuleId, RunId};
use ruleflow_domain::rule::Rule;
use ruleflow_domain::telemetry::TelemetryEvent;

use crate::ports::{DeviceTransport, EventPublisher};

/// Runtime limits of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Active runs older than this are terminated as `TimedOut`.
    pub max_run_duration: Option<Duration>,
    /// Number of finished runs whose status stays queryable.
    pub run_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_run_duration: Some(Duration::from_secs(3600)),
            run_history: 256,
        }
    }
}

/// Where a token stands on its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// About to enter the node through the given input.
    Enter(TargetPort),
    /// Done with the node, leaving through the given output.
    Leave(SourcePort),
}

#[derive(Debug, Clone)]
struct Token {
    run_id: RunId,
    node: NodeIndex,
    cursor: Cursor,
    path: Vec<NodeIndex>,
}

/// What entering a node did to the token.
enum Visit {
    Leave(SourcePort),
    /// Parked on a delay ticket; the ticket resumes it.
    Parked,
    /// Consumed by a join.
    Absorbed,
    Failed,
    /// The run finished while the token was in flight.
    Dropped,
}

struct RunState {
    rule: Arc<Rule>,
    status: RunStatus,
    live_tokens: usize,
    failed: bool,
    deadline: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Registry {
    runs: HashMap<RunId, RunState>,
    joins: JoinCoordinator,
    join_timers: HashMap<(RunId, NodeIndex), JoinHandle<()>>,
    delays: DelayScheduler<Token>,
    history: VecDeque<(RunId, RunStatus)>,
    closed: bool,
}

impl Registry {
    /// Terminate `run_id` and clear its side tables.
    fn finish(
        &mut self,
        run_id: RunId,
        status: RunStatus,
        history: usize,
    ) -> Option<EngineEvent> {
        debug_assert!(status.is_terminal(), "run finished as {status}");
        let run = self.runs.remove(&run_id)?;
        if let Some(deadline) = run.deadline {
            deadline.abort();
        }
        for node in self.joins.clear_run(run_id) {
            if let Some(timer) = self.join_timers.remove(&(run_id, node)) {
                timer.abort();
            }
        }
        self.delays.cancel_run(run_id);

        if history > 0 {
            while self.history.len() >= history {
                self.history.pop_front();
            }
            self.history.push_back((run_id, status));
        }
        tracing::info!(%run_id, rule = %run.rule.name, %status, "run finished");
        Some(EngineEvent::RunFinished {
            run_id,
            rule_id: run.rule.id,
            status,
            at: ruleflow_domain::time::now(),
        })
    }

    /// Drop one live token of `run_id`, finishing the run when it was the last.
    fn retire(&mut self, run_id: RunId, failed: bool, history: usize) -> Option<EngineEvent> {
        let run = self.runs.get_mut(&run_id)?;
        run.live_tokens = run.live_tokens.saturating_sub(1);
        run.failed |= failed;
        if run.live_tokens > 0 || self.joins.has_pending(run_id) {
            return None;
        }
        let status = if run.failed {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.finish(run_id, status, history)
    }
}

struct Inner<T, E> {
    config: EngineConfig,
    dispatcher: TriggerDispatcher,
    executor: ActionExecutor<T>,
    publisher: E,
    registry: Mutex<Registry>,
    tokens: mpsc::UnboundedSender<Token>,
    delay_wake: mpsc::UnboundedSender<()>,
}

/// Runs rules against incoming telemetry.
///
/// Cloning is cheap; clones share the same rules and runs. Construction
/// spawns the token dispatcher and the delay driver, so it must happen
/// inside a tokio runtime. Both background tasks stop once every clone
/// is dropped.
pub struct ExecutionEngine<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for ExecutionEngine<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> ExecutionEngine<T, E>
where
    T: DeviceTransport + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
{
    pub fn new(transport: T, publisher: E, config: EngineConfig) -> Self {
        let (tokens, token_rx) = mpsc::unbounded_channel();
        let (delay_wake, wake_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            config,
            dispatcher: TriggerDispatcher::new(),
            executor: ActionExecutor::new(transport),
            publisher,
            registry: Mutex::new(Registry::default()),
            tokens,
            delay_wake,
        });
        tokio::spawn(dispatch_tokens(Arc::downgrade(&inner), token_rx));
        tokio::spawn(drive_delays(Arc::downgrade(&inner), wake_rx));
        Self { inner }
    }

    /// Load `rule`, replacing any rule with the same id.
    ///
    /// Runs of a replaced rule finish on the graph they started with.
    ///
    /// # Errors
    ///
    /// Returns [`RuleflowError::Validation`] when the rule is invalid.
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id, name = %rule.name))]
    pub fn load_rule(&self, rule: Rule) -> Result<(), RuleflowError> {
        if self.inner.dispatcher.load(rule)?.is_some() {
            tracing::info!("rule replaced");
        } else {
            tracing::info!("rule loaded");
        }
        Ok(())
    }

    /// Unload a rule and cancel its active runs.
    ///
    /// # Errors
    ///
    /// Returns [`RuleflowError::NotFound`] when no rule has this id.
    #[tracing::instrument(skip(self))]
    pub async fn unload_rule(&self, id: RuleId) -> Result<Arc<Rule>, RuleflowError> {
        let rule = self.inner.dispatcher.unload(id).ok_or_else(|| NotFoundError {
            entity: "rule",
            id: id.to_string(),
        })?;
        let finished = {
            let mut registry = self.inner.registry();
            let runs: Vec<RunId> = registry
                .runs
                .iter()
                .filter(|(_, run)| run.rule.id == id)
                .map(|(run_id, _)| *run_id)
                .collect();
            runs.into_iter()
                .filter_map(|run_id| {
                    registry.finish(run_id, RunStatus::Cancelled, self.inner.config.run_history)
                })
                .collect::<Vec<_>>()
        };
        for event in finished {
            self.inner.emit(event).await;
        }
        Ok(rule)
    }

    /// Loaded rules ordered by id.
    #[must_use]
    pub fn rules(&self) -> Vec<Arc<Rule>> {
        self.inner.dispatcher.rules()
    }

    /// Feed a telemetry reading; starts one run per satisfied trigger.
    #[tracing::instrument(skip(self, event), fields(device = %event.device_id, variable = %event.variable, value = %event.value))]
    pub async fn on_event(&self, event: TelemetryEvent) -> Vec<RunId> {
        let matches = self.inner.dispatcher.dispatch(&event);
        let mut started = Vec::with_capacity(matches.len());
        for trigger in matches {
            if let Some(run_id) = self.inner.start_run(trigger).await {
                started.push(run_id);
            }
        }
        started
    }

    /// Cancel an active run.
    ///
    /// Join slots and delay tickets are dropped synchronously; an action
    /// already publishing completes first.
    ///
    /// # Errors
    ///
    /// Returns [`RuleflowError::NotFound`] when the run is not active.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_run(&self, run_id: RunId) -> Result<(), RuleflowError> {
        let finished = self.inner.registry().finish(
            run_id,
            RunStatus::Cancelled,
            self.inner.config.run_history,
        );
        let event = finished.ok_or_else(|| NotFoundError {
            entity: "run",
            id: run_id.to_string(),
        })?;
        self.inner.emit(event).await;
        Ok(())
    }

    /// Status of an active run or of a recently finished one.
    #[must_use]
    pub fn run_status(&self, run_id: RunId) -> Option<RunStatus> {
        let registry = self.inner.registry();
        registry.runs.get(&run_id).map(|run| run.status).or_else(|| {
            registry
                .history
                .iter()
                .rev()
                .find(|(id, _)| *id == run_id)
                .map(|(_, status)| *status)
        })
    }

    #[must_use]
    pub fn active_runs(&self) -> Vec<RunId> {
        self.inner.registry().runs.keys().copied().collect()
    }

    /// Cancel every active run and stop accepting new ones.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let finished = {
            let mut registry = self.inner.registry();
            registry.closed = true;
            let runs: Vec<RunId> = registry.runs.keys().copied().collect();
            runs.into_iter()
                .filter_map(|run_id| {
                    registry.finish(run_id, RunStatus::Cancelled, self.inner.config.run_history)
                })
                .collect::<Vec<_>>()
        };
        tracing::info!(cancelled = finished.len(), "engine shut down");
        for event in finished {
            self.inner.emit(event).await;
        }
    }
}

impl<T, E> Inner<T, E>
where
    T: DeviceTransport + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
{
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: EngineEvent) {
        if let Err(error) = self.publisher.publish(event).await {
            tracing::warn!(%error, "unable to publish engine event");
        }
    }

    async fn emit_node(&self, run_id: RunId, node_id: &NodeId, phase: NodePhase) {
        self.emit(EngineEvent::Node(NodeEvent {
            run_id,
            node_id: node_id.clone(),
            phase,
            at: ruleflow_domain::time::now(),
        }))
        .await;
    }

    async fn retire(&self, run_id: RunId, failed: bool) {
        let finished = self
            .registry()
            .retire(run_id, failed, self.config.run_history);
        if let Some(event) = finished {
            self.emit(event).await;
        }
    }

    /// Rule of `run_id` while the run is still active.
    fn active_rule(&self, run_id: RunId) -> Option<Arc<Rule>> {
        self.registry()
            .runs
            .get(&run_id)
            .map(|run| Arc::clone(&run.rule))
    }

    fn send_token(&self, token: Token) {
        if self.tokens.send(token).is_err() {
            tracing::debug!("token dispatcher stopped, dropping token");
        }
    }

    async fn start_run(self: &Arc<Self>, trigger: TriggerMatch) -> Option<RunId> {
        let run_id = RunId::new();
        let TriggerMatch { rule, trigger } = trigger;
        {
            let mut registry = self.registry();
            if registry.closed {
                return None;
            }
            let deadline = self.config.max_run_duration.map(|limit| {
                let engine = Arc::downgrade(self);
                tokio::spawn(async move {
                    tokio::time::sleep(limit).await;
                    if let Some(inner) = engine.upgrade() {
                        inner.time_out(run_id).await;
                    }
                })
            });
            registry.runs.insert(
                run_id,
                RunState {
                    rule: Arc::clone(&rule),
                    status: RunStatus::Pending,
                    live_tokens: 0,
                    failed: false,
                    deadline,
                },
            );
        }

        let trigger_id = rule.graph.node(trigger).id.clone();
        tracing::info!(%run_id, rule = %rule.name, trigger = %trigger_id, "run started");
        self.emit(EngineEvent::RunStarted {
            run_id,
            rule_id: rule.id,
            trigger: trigger_id,
            at: ruleflow_domain::time::now(),
        })
        .await;

        let mut registry = self.registry();
        let run = registry.runs.get_mut(&run_id)?;
        run.status = RunStatus::Running;
        run.live_tokens = 1;
        self.send_token(Token {
            run_id,
            node: trigger,
            cursor: Cursor::Enter(TargetPort::In),
            path: Vec::new(),
        });
        Some(run_id)
    }

    async fn time_out(&self, run_id: RunId) {
        let finished = {
            let mut registry = self.registry();
            // detach our own handle so finishing does not abort this task
            if let Some(run) = registry.runs.get_mut(&run_id) {
                run.deadline.take();
            }
            registry.finish(run_id, RunStatus::TimedOut, self.config.run_history)
        };
        if let Some(event) = finished {
            tracing::warn!(%run_id, "run exceeded its maximum duration");
            self.emit(event).await;
        }
    }

    /// Walk `token` along its path until it parks, forks out, or ends.
    async fn run_token(self: Arc<Self>, mut token: Token) {
        let run_id = token.run_id;
        loop {
            let Some(rule) = self.active_rule(run_id) else {
                tracing::debug!(%run_id, "run no longer active, dropping token");
                return;
            };
            let node = rule.graph.node(token.node);

            match token.cursor {
                Cursor::Enter(via) => {
                    if node.disabled {
                        tracing::debug!(%run_id, node = %node.id, "node disabled, dropping path");
                        self.retire(run_id, false).await;
                        return;
                    }
                    if token.path.contains(&token.node) {
                        tracing::warn!(%run_id, node = %node.id, "cycle detected on token path");
                        self.retire(run_id, true).await;
                        return;
                    }
                    token.path.push(token.node);
                    self.emit_node(run_id, &node.id, NodePhase::Entering).await;

                    match self.visit(&token, node, via).await {
                        Visit::Leave(port) => token.cursor = Cursor::Leave(port),
                        Visit::Parked | Visit::Dropped => return,
                        Visit::Absorbed => {
                            self.retire(run_id, false).await;
                            return;
                        }
                        Visit::Failed => {
                            self.emit_node(run_id, &node.id, NodePhase::Left).await;
                            self.retire(run_id, true).await;
                            return;
                        }
                    }
                }
                Cursor::Leave(port) => {
                    self.emit_node(run_id, &node.id, NodePhase::Left).await;
                    let mut targets = rule
                        .graph
                        .outgoing(token.node, port)
                        .map(|edge| (edge.target, edge.target_port));
                    let Some((next, via)) = targets.next() else {
                        tracing::debug!(%run_id, node = %node.id, "path ended");
                        self.retire(run_id, false).await;
                        return;
                    };
                    let forks: Vec<Token> = targets
                        .map(|(target, target_via)| Token {
                            run_id,
                            node: target,
                            cursor: Cursor::Enter(target_via),
                            path: token.path.clone(),
                        })
                        .collect();
                    if !forks.is_empty() && !self.fork(run_id, forks) {
                        return;
                    }
                    token.node = next;
                    token.cursor = Cursor::Enter(via);
                }
            }
        }
    }

    /// Register and dispatch extra tokens; `false` when the run is gone.
    fn fork(&self, run_id: RunId, forks: Vec<Token>) -> bool {
        let mut registry = self.registry();
        let Some(run) = registry.runs.get_mut(&run_id) else {
            return false;
        };
        run.live_tokens += forks.len();
        for token in forks {
            self.send_token(token);
        }
        true
    }

    async fn visit(self: &Arc<Self>, token: &Token, node: &Node, via: TargetPort) -> Visit {
        let run_id = token.run_id;
        match &node.data {
            NodeData::Trigger(_) => Visit::Leave(SourcePort::Out),
            NodeData::Condition(condition) => {
                self.emit_node(run_id, &node.id, NodePhase::Executing).await;
                let port = self
                    .dispatcher
                    .with_snapshot(|snapshot| condition::route(condition, snapshot));
                tracing::debug!(%run_id, node = %node.id, ?port, "condition evaluated");
                Visit::Leave(port)
            }
            NodeData::Action(_) => {
                self.emit_node(run_id, &node.id, NodePhase::Executing).await;
                match self.executor.execute(node).await {
                    Ok(Some(command)) => {
                        self.emit(EngineEvent::CommandIssued {
                            run_id,
                            node_id: node.id.clone(),
                            command,
                            at: ruleflow_domain::time::now(),
                        })
                        .await;
                        Visit::Leave(SourcePort::Out)
                    }
                    Ok(None) => Visit::Leave(SourcePort::Out),
                    Err(error) => {
                        tracing::warn!(%run_id, node = %node.id, %error, "command delivery failed");
                        Visit::Failed
                    }
                }
            }
            NodeData::Delay(delay) => {
                let scheduled = {
                    let mut registry = self.registry();
                    if !registry.runs.contains_key(&run_id) {
                        tracing::debug!(%run_id, node = %node.id, "run no longer active, dropping token");
                        return Visit::Dropped;
                    }
                    let parked = Token {
                        cursor: Cursor::Leave(SourcePort::Out),
                        ..token.clone()
                    };
                    registry
                        .delays
                        .schedule(run_id, token.node, parked, delay, Instant::now())
                };
                match scheduled {
                    Ok(resume_at) => {
                        let _ = self.delay_wake.send(());
                        tracing::debug!(%run_id, node = %node.id, ?resume_at, "token parked");
                        self.emit_node(run_id, &node.id, NodePhase::Waiting).await;
                        Visit::Parked
                    }
                    Err(error) => {
                        tracing::warn!(%run_id, node = %node.id, %error, "invalid delay");
                        Visit::Failed
                    }
                }
            }
            NodeData::Join(join) => {
                let TargetPort::Join(input) = via else {
                    tracing::warn!(%run_id, node = %node.id, "token reached join without an input handle");
                    return Visit::Failed;
                };
                let timeout = match join.timeout() {
                    Ok(timeout) => timeout,
                    Err(error) => {
                        tracing::warn!(%run_id, node = %node.id, %error, "invalid join timeout");
                        return Visit::Failed;
                    }
                };
                let Some(outcome) = self.arrive_at_join(run_id, token.node, input, join.mode, timeout)
                else {
                    tracing::debug!(%run_id, node = %node.id, "run no longer active, dropping token");
                    return Visit::Dropped;
                };
                tracing::debug!(%run_id, node = %node.id, ?input, ?outcome, "join arrival");
                match outcome {
                    JoinOutcome::Waiting { .. } => {
                        self.emit_node(run_id, &node.id, NodePhase::Waiting).await;
                        Visit::Absorbed
                    }
                    JoinOutcome::Resolved(branch) => {
                        self.emit_node(run_id, &node.id, NodePhase::Executing).await;
                        Visit::Leave(SourcePort::Branch(branch))
                    }
                    JoinOutcome::Ignored => {
                        self.emit_node(run_id, &node.id, NodePhase::Left).await;
                        Visit::Absorbed
                    }
                }
            }
        }
    }

    /// Record a join arrival; `None` when the run is gone.
    fn arrive_at_join(
        self: &Arc<Self>,
        run_id: RunId,
        node: NodeIndex,
        input: JoinInput,
        mode: JoinMode,
        timeout: Duration,
    ) -> Option<JoinOutcome> {
        let mut registry = self.registry();
        if !registry.runs.contains_key(&run_id) {
            return None;
        }
        let outcome = registry
            .joins
            .arrive(run_id, node, input, mode, timeout, Instant::now());
        match outcome {
            JoinOutcome::Waiting { deadline } => {
                let engine = Arc::downgrade(self);
                let timer = tokio::spawn(async move {
                    tokio::time::sleep_until(deadline).await;
                    if let Some(inner) = engine.upgrade() {
                        inner.expire_join(run_id, node);
                    }
                });
                registry.join_timers.insert((run_id, node), timer);
            }
            JoinOutcome::Resolved(_) => {
                if let Some(timer) = registry.join_timers.remove(&(run_id, node)) {
                    timer.abort();
                }
            }
            JoinOutcome::Ignored => {}
        }
        Some(outcome)
    }

    /// Deadline of an AND join elapsed: continue on its `false` output.
    fn expire_join(&self, run_id: RunId, node: NodeIndex) {
        let mut registry = self.registry();
        registry.join_timers.remove(&(run_id, node));
        if !registry.joins.expire(run_id, node) {
            return;
        }
        let Some(run) = registry.runs.get_mut(&run_id) else {
            return;
        };
        run.live_tokens += 1;
        tracing::debug!(%run_id, node = node.get(), "join timed out");
        self.send_token(Token {
            run_id,
            node,
            cursor: Cursor::Leave(SourcePort::Branch(false)),
            path: vec![node],
        });
    }

    fn next_delay(&self) -> Option<Instant> {
        self.registry().delays.next_deadline()
    }

    fn resume_due_delays(&self) {
        let mut registry = self.registry();
        for token in registry.delays.pop_due(Instant::now()) {
            if registry.runs.contains_key(&token.run_id) {
                self.send_token(token);
            }
        }
    }
}

/// Spawn one task per dispatched token.
async fn dispatch_tokens<T, E>(engine: Weak<Inner<T, E>>, mut tokens: mpsc::UnboundedReceiver<Token>)
where
    T: DeviceTransport + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
{
    while let Some(token) = tokens.recv().await {
        let Some(inner) = engine.upgrade() else {
            break;
        };
        tokio::spawn(inner.run_token(token));
    }
}

/// Sleep until the earliest delay ticket and resume every due token.
async fn drive_delays<T, E>(engine: Weak<Inner<T, E>>, mut wake: mpsc::UnboundedReceiver<()>)
where
    T: DeviceTransport + Send + Sync + 'static,
    E: EventPublisher + Send + Sync + 'static,
{
    loop {
        let next = match engine.upgrade() {
            Some(inner) => inner.next_delay(),
            None => return,
        };
        let awake = match next {
            Some(deadline) => tokio::select! {
                () = tokio::time::sleep_until(deadline) => true,
                message = wake.recv() => message.is_some(),
            },
            None => wake.recv().await.is_some(),
        };
        if !awake {
            return;
        }
        match engine.upgrade() {
            Some(inner) => inner.resume_due_delays(),
            None => return,
        }
    }
}
