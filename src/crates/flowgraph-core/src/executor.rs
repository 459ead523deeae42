//! The traversal state machine
//!
//! The [`Executor`] drives one graph: it resolves the start node, executes
//! nodes with their timeout/retry behaviour, routes along edges after each
//! completed step, fans out parallel groups onto isolated state clones, and
//! assembles the final [`ExecutionReport`]. Per run it moves
//! `NotStarted → Running → {Completed, Failed, Cancelled}`:
//!
//! - `Running → Running` on each successful step.
//! - `Running → Failed` when a node fails with no error edge to take, or
//!   when the step counter hits the configured limit (runaway-loop
//!   protection — always surfaced, never silently truncated).
//! - `Running → Cancelled` when the cancellation token is observed between
//!   steps. A node that has begun always runs to completion or timeout; the
//!   engine never kills a body mid-flight.
//!
//! Failures are reacted to per [`FailureKind`]: transient failures retry
//! locally under the node's (or default) policy and only surface once
//! attempts exhaust; permanent and validation failures (and exhausted
//! transients) are routed along an error-designated edge when the failing
//! node has one, otherwise the run fails carrying the node id, failure kind,
//! and partial path.
//!
//! Whatever happens, callers get a structured report — status, final or
//! partial state, full path, typed error — never a bare panic across the
//! engine boundary.

use crate::checkpoint::CheckpointManager;
use crate::context::ExecutionContext;
use crate::edge::{EdgeKey, JoinPolicy, Route, Router};
use crate::error::{GraphError, Result};
use crate::events::{EventBus, EventKind, EventStream};
use crate::graph::Graph;
use crate::node::{FailureKind, Node, NodeError, NodeId, TimeoutBehavior};
use crate::retry::RetryState;
use crate::state::{ConflictPolicy, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-executor configuration
///
/// These are the only recognized configuration keys: the step limit, the
/// checkpoint interval, the default node timeout, and the cancellation
/// token — plus engine-level defaults for retries and join merging.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Hard ceiling on steps per execution (runaway-loop protection)
    pub step_limit: u64,

    /// Checkpoint every N completed steps; 0 disables interval checkpoints
    pub checkpoint_interval: u64,

    /// Timeout applied to nodes that don't carry their own
    pub default_node_timeout: Option<Duration>,

    /// Retry policy applied to transient failures of nodes that don't carry
    /// their own
    pub default_retry: crate::retry::RetryPolicy,

    /// Conflict policy used when parallel branches merge at a join
    pub conflict_policy: ConflictPolicy,

    /// Cooperative cancellation signal, checked between steps
    pub cancellation: CancellationToken,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_limit: 256,
            checkpoint_interval: 0,
            default_node_timeout: None,
            default_retry: crate::retry::RetryPolicy::default(),
            conflict_policy: ConflictPolicy::PreferIncoming,
            cancellation: CancellationToken::new(),
        }
    }
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of steps per execution
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Checkpoint every `interval` completed steps (0 disables)
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Default per-node timeout
    pub fn with_default_node_timeout(mut self, timeout: Duration) -> Self {
        self.default_node_timeout = Some(timeout);
        self
    }

    /// Default retry policy for transient failures
    pub fn with_default_retry(mut self, policy: crate::retry::RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    /// Conflict policy for parallel-join merges
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Cancellation token observed between steps
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Terminal status of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Traversal reached a terminal node or a designed dead end
    Completed,
    /// A node failure or the step limit ended the run
    Failed,
    /// Cancellation was observed between steps
    Cancelled,
}

/// Typed error carried by a failed execution
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionError {
    /// A node failed and no error edge was available
    #[error("Node '{node}' failed ({kind}): {message}")]
    Node {
        node: NodeId,
        kind: FailureKind,
        message: String,
    },

    /// The step counter exceeded the configured limit
    #[error("Step limit {limit} exceeded; runaway traversal aborted")]
    RunawayLoop { limit: u64 },
}

/// Structured result of one execution
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Id of the run
    pub execution_id: Uuid,

    /// Terminal status
    pub status: ExecutionStatus,

    /// Final state (partial on failure/cancellation)
    pub state: State,

    /// Ordered ids of every node whose execution was attempted
    pub path: Vec<NodeId>,

    /// Step counter; equals `path.len()`
    pub steps: u64,

    /// The run ended at a node whose edges all declined to match — a
    /// designed dead end, distinct from a terminal node with no edges
    pub dead_end: bool,

    /// Failure detail when `status` is [`ExecutionStatus::Failed`]
    pub error: Option<ExecutionError>,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Run end time
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Whether the run completed normally
    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// What the main loop does next
enum StepPlan {
    /// Execute this node
    Execute(NodeId),
    /// The node already ran (or was restored from a checkpoint); resolve its
    /// outgoing edges
    RouteFrom(NodeId),
}

/// Routing result translated into loop terms
enum NextStep {
    Run(NodeId),
    Fork {
        branches: Vec<NodeId>,
        join: NodeId,
        policy: JoinPolicy,
    },
    Finish {
        dead_end: bool,
    },
}

/// Result of one parallel section
enum ForkResult {
    /// All required branches joined; execute the join node next
    Continue(NodeId),
    Finish(ExecutionStatus, Option<ExecutionError>),
}

/// How one spawned branch ended
enum BranchOutcome {
    Joined {
        state: State,
        path: Vec<NodeId>,
        steps: u64,
        edge_counts: HashMap<EdgeKey, u64>,
    },
    Failed(ExecutionError),
    Cancelled,
}

/// Drives graph traversal for any number of executions
///
/// Built by [`GraphBuilder::build`](crate::builder::GraphBuilder::build).
/// `invoke` runs the graph from its start node; `resume` continues a
/// checkpointed run. The executor is immutable and `Send + Sync`, so it can
/// be shared (`Arc`) across tasks and nested into other graphs as a
/// subgraph.
pub struct Executor {
    graph: Arc<Graph>,
    config: ExecutionConfig,
    events: EventBus,
    checkpoints: Option<CheckpointManager>,
}

impl Executor {
    pub(crate) fn new(
        graph: Graph,
        config: ExecutionConfig,
        events: EventBus,
        checkpoints: Option<CheckpointManager>,
    ) -> Self {
        Self {
            graph: Arc::new(graph),
            config,
            events,
            checkpoints,
        }
    }

    /// The compiled graph this executor drives
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// This executor's configuration
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// The event bus lifecycle events are emitted on
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    /// Run the graph from its start node with the given initial state
    pub async fn invoke(&self, initial: State) -> Result<ExecutionReport> {
        let ctx = ExecutionContext::new().with_cancellation(self.config.cancellation.clone());
        info!(
            execution_id = %ctx.execution_id,
            start = %self.graph.start,
            "execution starting"
        );
        self.events.emit(ctx.execution_id, EventKind::ExecutionStarted);
        self.run(ctx, initial, StepPlan::Execute(self.graph.start.clone()))
            .await
    }

    /// Continue a checkpointed execution from its most recent snapshot
    ///
    /// The checkpointed node is not re-executed; traversal re-routes from it.
    /// Predicates are pure functions of state, so re-routing reproduces the
    /// original decision — resuming twice from the same checkpoint does the
    /// same work both times.
    pub async fn resume(&self, execution_id: Uuid) -> Result<ExecutionReport> {
        let manager = self
            .checkpoints
            .as_ref()
            .ok_or_else(|| GraphError::execution("resume requires a checkpoint store"))?;

        let (mut ctx, state) = manager.resume(execution_id).await?;
        ctx.cancellation = self.config.cancellation.clone();
        let from = ctx
            .current_node
            .clone()
            .ok_or_else(|| GraphError::execution("checkpoint records no position"))?;

        info!(
            execution_id = %execution_id,
            from = %from,
            step = ctx.step,
            "execution resuming from checkpoint"
        );
        self.events.emit(ctx.execution_id, EventKind::ExecutionStarted);
        self.run(ctx, state, StepPlan::RouteFrom(from)).await
    }

    async fn run(
        &self,
        mut ctx: ExecutionContext,
        mut state: State,
        mut plan: StepPlan,
    ) -> Result<ExecutionReport> {
        let mut dead_end = false;

        let (status, error) = loop {
            if ctx.is_cancelled() {
                break (ExecutionStatus::Cancelled, None);
            }

            let node_id = match plan {
                StepPlan::Execute(id) => id,
                StepPlan::RouteFrom(id) => match self.route_from(&id, &state, &mut ctx) {
                    NextStep::Run(next) => next,
                    NextStep::Fork {
                        branches,
                        join,
                        policy,
                    } => match self
                        .run_parallel(&mut ctx, &mut state, branches, join, policy)
                        .await
                    {
                        ForkResult::Continue(join_node) => join_node,
                        ForkResult::Finish(status, error) => break (status, error),
                    },
                    NextStep::Finish { dead_end: flagged } => {
                        dead_end = flagged;
                        break (ExecutionStatus::Completed, None);
                    }
                },
            };

            if ctx.step >= self.config.step_limit {
                warn!(
                    execution_id = %ctx.execution_id,
                    limit = self.config.step_limit,
                    "step limit exceeded; aborting traversal"
                );
                break (
                    ExecutionStatus::Failed,
                    Some(ExecutionError::RunawayLoop {
                        limit: self.config.step_limit,
                    }),
                );
            }

            let node = match self.graph.node(&node_id) {
                Some(node) => node,
                // Unreachable after build-time validation; surfaced as a
                // plumbing error rather than a report.
                None => return Err(GraphError::UnknownNode(node_id)),
            };

            match execute_node(node, &state, &self.config, &self.events, ctx.execution_id).await {
                Ok(new_state) => {
                    state = new_state;
                    ctx.record_step(&node_id);
                    debug!(execution_id = %ctx.execution_id, node = %node_id, step = ctx.step, "step completed");
                    self.checkpoint_step(&ctx, &state).await;
                    plan = StepPlan::RouteFrom(node_id);
                }
                Err(err) => {
                    ctx.record_step(&node_id);
                    if let Some(handler) = self.graph.error_edge(&node_id) {
                        warn!(
                            execution_id = %ctx.execution_id,
                            node = %node_id,
                            error = %err,
                            handler = %handler,
                            "node failed; taking error edge"
                        );
                        self.checkpoint_step(&ctx, &state).await;
                        plan = StepPlan::Execute(handler.clone());
                    } else {
                        break (
                            ExecutionStatus::Failed,
                            Some(ExecutionError::Node {
                                node: node_id,
                                kind: err.kind,
                                message: err.message,
                            }),
                        );
                    }
                }
            }
        };

        self.finish(ctx, state, status, error, dead_end).await
    }

    /// Resolve the next hop after `node_id` completed
    fn route_from(&self, node_id: &NodeId, state: &State, ctx: &mut ExecutionContext) -> NextStep {
        let events = &self.events;
        let execution_id = ctx.execution_id;
        let route = Router::resolve(
            self.graph.outgoing(node_id),
            state,
            &ctx.edge_counts,
            |edge, result| {
                events.emit(
                    execution_id,
                    EventKind::ConditionEvaluated {
                        source: edge.source.clone(),
                        target: edge.target.clone(),
                        label: edge.label.clone(),
                        result,
                    },
                );
            },
        );

        match route {
            Route::Next { target, order } => {
                *ctx.edge_counts
                    .entry((node_id.clone(), order))
                    .or_insert(0) += 1;
                debug!(execution_id = %execution_id, from = %node_id, to = %target, "routed");
                NextStep::Run(target)
            }
            Route::Parallel {
                branches,
                join,
                policy,
            } => NextStep::Fork {
                branches,
                join,
                policy,
            },
            Route::DeadEnd => {
                debug!(execution_id = %execution_id, node = %node_id, "no edge matched; designed dead end");
                NextStep::Finish { dead_end: true }
            }
            Route::Terminal => NextStep::Finish { dead_end: false },
        }
    }

    /// Fan out a parallel group, wait per the join policy, merge in branch
    /// registration order
    async fn run_parallel(
        &self,
        ctx: &mut ExecutionContext,
        state: &mut State,
        branches: Vec<NodeId>,
        join: NodeId,
        policy: JoinPolicy,
    ) -> ForkResult {
        if ctx.is_cancelled() {
            return ForkResult::Finish(ExecutionStatus::Cancelled, None);
        }

        debug!(
            execution_id = %ctx.execution_id,
            branches = ?branches,
            join = %join,
            "parallel fan-out"
        );

        let total = branches.len();
        let mut handles = Vec::with_capacity(total);
        for target in branches {
            let handle = tokio::spawn(walk_branch(
                Arc::clone(&self.graph),
                self.config.clone(),
                self.events.clone(),
                state.clone(),
                target.clone(),
                join.clone(),
                ctx.execution_id,
                ctx.cancellation.clone(),
            ));
            handles.push((target, handle));
        }

        // Branches settle fully even under a quorum policy; collecting in
        // spawn order keeps the merge deterministic.
        let mut outcomes = Vec::with_capacity(total);
        for (target, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(_) => BranchOutcome::Failed(ExecutionError::Node {
                    node: target,
                    kind: FailureKind::Permanent,
                    message: "branch task panicked".to_string(),
                }),
            };
            outcomes.push(outcome);
        }

        if outcomes
            .iter()
            .any(|o| matches!(o, BranchOutcome::Cancelled))
        {
            return ForkResult::Finish(ExecutionStatus::Cancelled, None);
        }

        let required = match policy {
            JoinPolicy::All => total,
            JoinPolicy::Quorum(n) => n,
        };

        let mut first_failure = None;
        let mut joined = Vec::new();
        for outcome in outcomes {
            match outcome {
                BranchOutcome::Joined {
                    state,
                    path,
                    steps,
                    edge_counts,
                } => joined.push((state, path, steps, edge_counts)),
                BranchOutcome::Failed(error) => {
                    if first_failure.is_none() {
                        first_failure = Some(error);
                    }
                }
                BranchOutcome::Cancelled => unreachable!("handled above"),
            }
        }

        if joined.len() < required {
            let error = first_failure.unwrap_or(ExecutionError::Node {
                node: join,
                kind: FailureKind::Permanent,
                message: format!("only {} of {} required branches joined", joined.len(), required),
            });
            return ForkResult::Finish(ExecutionStatus::Failed, Some(error));
        }

        for (branch_state, path, steps, edge_counts) in joined {
            state.merge(&branch_state, self.config.conflict_policy);
            ctx.step += steps;
            ctx.path.extend(path);
            for (key, count) in edge_counts {
                *ctx.edge_counts.entry(key).or_insert(0) += count;
            }
        }

        if ctx.is_cancelled() {
            return ForkResult::Finish(ExecutionStatus::Cancelled, None);
        }

        ForkResult::Continue(join)
    }

    async fn checkpoint_step(&self, ctx: &ExecutionContext, state: &State) {
        if let Some(manager) = &self.checkpoints {
            match manager.maybe_checkpoint(ctx, state).await {
                Ok(Some(_)) => {
                    self.events
                        .emit(ctx.execution_id, EventKind::CheckpointSaved { step: ctx.step });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(execution_id = %ctx.execution_id, error = %e, "checkpoint save failed; continuing");
                }
            }
        }
    }

    async fn finish(
        &self,
        mut ctx: ExecutionContext,
        state: State,
        status: ExecutionStatus,
        error: Option<ExecutionError>,
        dead_end: bool,
    ) -> Result<ExecutionReport> {
        ctx.finish();

        match status {
            ExecutionStatus::Failed => {
                // Best-effort snapshot enabling post-mortem resume-and-patch.
                if let Some(manager) = &self.checkpoints {
                    if ctx.step > 0 {
                        match manager.force_checkpoint(&ctx, &state).await {
                            Ok(_) => self.events.emit(
                                ctx.execution_id,
                                EventKind::CheckpointSaved { step: ctx.step },
                            ),
                            Err(e) => {
                                warn!(execution_id = %ctx.execution_id, error = %e, "failure checkpoint not saved");
                            }
                        }
                    }
                }
                let message = error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "execution failed".to_string());
                let node = match &error {
                    Some(ExecutionError::Node { node, .. }) => Some(node.clone()),
                    _ => None,
                };
                warn!(execution_id = %ctx.execution_id, error = %message, "execution failed");
                self.events
                    .emit(ctx.execution_id, EventKind::ExecutionFailed { node, message });
            }
            ExecutionStatus::Completed | ExecutionStatus::Cancelled => {
                info!(
                    execution_id = %ctx.execution_id,
                    status = ?status,
                    steps = ctx.step,
                    "execution finished"
                );
                self.events
                    .emit(ctx.execution_id, EventKind::ExecutionCompleted { status });
            }
        }

        Ok(ExecutionReport {
            execution_id: ctx.execution_id,
            status,
            state,
            path: ctx.path,
            steps: ctx.step,
            dead_end,
            error,
            started_at: ctx.started_at,
            finished_at: ctx.finished_at.unwrap_or_else(Utc::now),
        })
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("nodes", &self.graph.node_count())
            .field("start", &self.graph.start)
            .field("config", &self.config)
            .field("checkpointing", &self.checkpoints.is_some())
            .finish()
    }
}

/// Execute one node with hooks, timeout, and transient-failure retries
///
/// The body runs against a clone of the state, so a failed attempt discards
/// its partial writes; only a successful body's state moves the run forward.
async fn execute_node(
    node: &Node,
    state: &State,
    config: &ExecutionConfig,
    events: &EventBus,
    execution_id: Uuid,
) -> std::result::Result<State, NodeError> {
    events.emit(
        execution_id,
        EventKind::NodeStarted {
            node: node.id.clone(),
        },
    );
    let started = Instant::now();

    let policy = node
        .retry
        .clone()
        .unwrap_or_else(|| config.default_retry.clone());
    let timeout = node.timeout.or(config.default_node_timeout);
    let mut retries = RetryState::new();

    let result = loop {
        if let Some(hook) = &node.before {
            hook(state);
        }

        let body = (node.executor)(state.clone());
        let attempt = match timeout {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(result) => result,
                Err(_) => Err(match node.on_timeout {
                    TimeoutBehavior::Transient => NodeError::transient(format!(
                        "node '{}' timed out after {:?}",
                        node.id, limit
                    )),
                    TimeoutBehavior::Permanent => NodeError::permanent(format!(
                        "node '{}' timed out after {:?}",
                        node.id, limit
                    )),
                }),
            },
            None => body.await,
        };

        match attempt {
            Ok(new_state) => {
                if let Some(hook) = &node.after {
                    hook(&new_state);
                }
                break Ok(new_state);
            }
            Err(err) => {
                retries.record_attempt(Some(err.message.clone()));
                if err.is_retryable() && policy.should_retry(retries.attempts) {
                    let delay = policy.calculate_delay(retries.attempts - 1);
                    warn!(
                        execution_id = %execution_id,
                        node = %node.id,
                        attempts = retries.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "transient failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                break Err(err);
            }
        }
    };

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    events.emit(
        execution_id,
        EventKind::NodeCompleted {
            node: node.id.clone(),
            duration_ms,
            success: result.is_ok(),
        },
    );
    result
}

/// Walk one parallel branch on its own state clone until the join node
///
/// The branch owns its clone exclusively; no synchronization is needed until
/// the merge back at the join. Error edges apply inside branches exactly as
/// in the main loop. A branch that terminates or dead-ends before reaching
/// the join reports failure, as does one that meets a nested parallel group.
#[allow(clippy::too_many_arguments)]
async fn walk_branch(
    graph: Arc<Graph>,
    config: ExecutionConfig,
    events: EventBus,
    mut state: State,
    entry: NodeId,
    join: NodeId,
    execution_id: Uuid,
    cancellation: CancellationToken,
) -> BranchOutcome {
    let mut path: Vec<NodeId> = Vec::new();
    let mut steps: u64 = 0;
    let mut edge_counts: HashMap<EdgeKey, u64> = HashMap::new();
    let mut current = entry;

    loop {
        if cancellation.is_cancelled() {
            return BranchOutcome::Cancelled;
        }
        if current == join {
            return BranchOutcome::Joined {
                state,
                path,
                steps,
                edge_counts,
            };
        }
        if steps >= config.step_limit {
            return BranchOutcome::Failed(ExecutionError::RunawayLoop {
                limit: config.step_limit,
            });
        }

        let node = match graph.node(&current) {
            Some(node) => node,
            None => {
                return BranchOutcome::Failed(ExecutionError::Node {
                    node: current,
                    kind: FailureKind::Permanent,
                    message: "unknown node in branch".to_string(),
                })
            }
        };

        match execute_node(node, &state, &config, &events, execution_id).await {
            Ok(new_state) => {
                state = new_state;
                steps += 1;
                path.push(current.clone());
            }
            Err(err) => {
                steps += 1;
                path.push(current.clone());
                if let Some(handler) = graph.error_edge(&current) {
                    warn!(
                        execution_id = %execution_id,
                        node = %current,
                        error = %err,
                        handler = %handler,
                        "branch node failed; taking error edge"
                    );
                    current = handler.clone();
                    continue;
                }
                return BranchOutcome::Failed(ExecutionError::Node {
                    node: current,
                    kind: err.kind,
                    message: err.message,
                });
            }
        }

        let route = Router::resolve(
            graph.outgoing(&current),
            &state,
            &edge_counts,
            |edge, result| {
                events.emit(
                    execution_id,
                    EventKind::ConditionEvaluated {
                        source: edge.source.clone(),
                        target: edge.target.clone(),
                        label: edge.label.clone(),
                        result,
                    },
                );
            },
        );

        match route {
            Route::Next { target, order } => {
                *edge_counts.entry((current.clone(), order)).or_insert(0) += 1;
                current = target;
            }
            Route::Parallel { .. } => {
                return BranchOutcome::Failed(ExecutionError::Node {
                    node: current,
                    kind: FailureKind::Permanent,
                    message: "nested parallel groups are not supported".to_string(),
                });
            }
            Route::DeadEnd | Route::Terminal => {
                return BranchOutcome::Failed(ExecutionError::Node {
                    node: current.clone(),
                    kind: FailureKind::Permanent,
                    message: format!(
                        "branch ended at '{}' before reaching join '{}'",
                        current, join
                    ),
                });
            }
        }
    }
}
