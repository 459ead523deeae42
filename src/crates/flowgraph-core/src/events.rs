//! Typed lifecycle events and the bounded event bus
//!
//! The executor emits an [`ExecutionEvent`] at every lifecycle boundary:
//! execution start/end, node start/completion, predicate evaluations, and
//! checkpoint saves. Subscribers receive them through an [`EventStream`]
//! (a `futures::Stream`), optionally narrowed by an [`EventFilter`].
//!
//! Delivery is at-least-once per in-process subscriber over a **bounded**
//! `tokio::sync::broadcast` channel. A subscriber that falls more than the
//! bus capacity behind loses the oldest events; the stream surfaces that as a
//! synthesized [`EventKind::Dropped`] marker carrying the missed count, then
//! continues with the live tail. Memory use is bounded by construction —
//! there is no unbounded buffering mode.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::events::{EventBus, EventKind};
//! use futures::StreamExt;
//! use uuid::Uuid;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(Uuid::new_v4(), EventKind::ExecutionStarted);
//!
//! let event = stream.next().await.unwrap();
//! assert_eq!(event.kind, EventKind::ExecutionStarted);
//! # }
//! ```

use crate::executor::ExecutionStatus;
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// One lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionEvent {
    /// Execution this event belongs to; `None` only for synthesized
    /// [`EventKind::Dropped`] markers
    pub execution_id: Option<Uuid>,

    /// Emission time
    pub timestamp: DateTime<Utc>,

    /// What happened
    pub kind: EventKind,
}

impl ExecutionEvent {
    /// Node id this event is about, when it is about one
    pub fn node_id(&self) -> Option<&NodeId> {
        match &self.kind {
            EventKind::NodeStarted { node } => Some(node),
            EventKind::NodeCompleted { node, .. } => Some(node),
            EventKind::ConditionEvaluated { source, .. } => Some(source),
            EventKind::ExecutionFailed { node: Some(node), .. } => Some(node),
            _ => None,
        }
    }
}

/// Event payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum EventKind {
    /// Traversal began (also emitted when a checkpointed run resumes)
    ExecutionStarted,

    /// A node body is about to run
    NodeStarted { node: NodeId },

    /// A node finished (success or final failure, retries included)
    NodeCompleted {
        node: NodeId,
        duration_ms: f64,
        success: bool,
    },

    /// A routing predicate was evaluated
    ConditionEvaluated {
        source: NodeId,
        target: NodeId,
        label: Option<String>,
        result: bool,
    },

    /// A checkpoint was persisted after the given step
    CheckpointSaved { step: u64 },

    /// Traversal ended; `status` distinguishes completed/cancelled
    ExecutionCompleted { status: ExecutionStatus },

    /// Traversal failed
    ExecutionFailed {
        node: Option<NodeId>,
        message: String,
    },

    /// This subscriber fell behind and lost `missed` older events
    Dropped { missed: u64 },
}

impl EventKind {
    /// Discriminant used by [`EventFilter`]
    pub fn tag(&self) -> EventTag {
        match self {
            EventKind::ExecutionStarted => EventTag::ExecutionStarted,
            EventKind::NodeStarted { .. } => EventTag::NodeStarted,
            EventKind::NodeCompleted { .. } => EventTag::NodeCompleted,
            EventKind::ConditionEvaluated { .. } => EventTag::ConditionEvaluated,
            EventKind::CheckpointSaved { .. } => EventTag::CheckpointSaved,
            EventKind::ExecutionCompleted { .. } => EventTag::ExecutionCompleted,
            EventKind::ExecutionFailed { .. } => EventTag::ExecutionFailed,
            EventKind::Dropped { .. } => EventTag::Dropped,
        }
    }
}

/// Payload-free discriminant of [`EventKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTag {
    ExecutionStarted,
    NodeStarted,
    NodeCompleted,
    ConditionEvaluated,
    CheckpointSaved,
    ExecutionCompleted,
    ExecutionFailed,
    Dropped,
}

/// Subscriber-side event selection
///
/// An empty filter matches everything. With `kinds` set, only those tags
/// pass; with `node` set, only events *about* that node pass (events that are
/// not about any node, like `ExecutionStarted`, are filtered out).
/// Synthesized `Dropped` markers always pass — losing events should never be
/// silent.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    kinds: Option<HashSet<EventTag>>,
    node: Option<NodeId>,
}

impl EventFilter {
    /// Match-everything filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given event kinds
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventTag>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Restrict to events about one node
    pub fn with_node(mut self, node: impl Into<NodeId>) -> Self {
        self.node = Some(node.into());
        self
    }

    /// Whether an event passes this filter
    pub fn matches(&self, event: &ExecutionEvent) -> bool {
        if event.kind.tag() == EventTag::Dropped {
            return true;
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind.tag()) {
                return false;
            }
        }
        if let Some(node) = &self.node {
            if event.node_id() != Some(node) {
                return false;
            }
        }
        true
    }
}

/// Bounded broadcast bus for execution events
///
/// Cloning the bus clones the sender; all clones feed the same subscribers.
/// Emission never blocks and never fails — with no subscribers events are
/// simply discarded.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ExecutionEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Per-subscriber buffer bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Emit an event for an execution
    pub fn emit(&self, execution_id: Uuid, kind: EventKind) {
        let event = ExecutionEvent {
            execution_id: Some(execution_id),
            timestamp: Utc::now(),
            kind,
        };
        // No subscribers is fine; the event just goes nowhere.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events from now on
    pub fn subscribe(&self) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.tx.subscribe()),
            filter: None,
        }
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered(&self, filter: EventFilter) -> EventStream {
        EventStream {
            inner: BroadcastStream::new(self.tx.subscribe()),
            filter: Some(filter),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Stream of events for one subscriber
///
/// Ends when every bus handle has been dropped. Overruns surface as
/// [`EventKind::Dropped`] markers rather than errors.
pub struct EventStream {
    inner: BroadcastStream<ExecutionEvent>,
    filter: Option<EventFilter>,
}

impl Stream for EventStream {
    type Item = ExecutionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    let passes = self
                        .filter
                        .as_ref()
                        .map(|f| f.matches(&event))
                        .unwrap_or(true);
                    if passes {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    tracing::warn!(missed, "event subscriber lagged; oldest events dropped");
                    return Poll::Ready(Some(ExecutionEvent {
                        execution_id: None,
                        timestamp: Utc::now(),
                        kind: EventKind::Dropped { missed },
                    }));
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
