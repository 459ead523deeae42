//! Edges and the first-match router
//!
//! An [`Edge`] is a directed, optionally guarded transition between two
//! nodes. A node's outgoing edges form one of two group shapes:
//!
//! - **First-match** (the default): edges are evaluated in registration
//!   order against the post-execution state; the first edge whose predicate
//!   is true (an edge without a predicate always matches) supplies the next
//!   node. Because an unguarded edge matches unconditionally, it must be
//!   registered *after* every guarded sibling — the builder rejects graphs
//!   that violate this ordering.
//! - **Parallel**: every branch edge is taken concurrently, each on an
//!   isolated clone of the state, converging at a designated join node.
//!
//! Predicates must be pure functions of state — no clocks, no randomness, no
//! side effects. That is what makes routing deterministic: identical state
//! and identical edges always resolve to the identical target.
//!
//! A node whose group exists but matches nothing is a **designed dead end**:
//! the run completes, flagged distinctly from a true terminal node (zero
//! outgoing edges).

use crate::node::NodeId;
use crate::state::State;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Pure boolean guard over the state
pub type EdgePredicate = Arc<dyn Fn(&State) -> bool + Send + Sync>;

/// Key identifying an edge for traversal counting: `(source, order)`
pub type EdgeKey = (NodeId, usize);

/// A directed, optionally guarded transition
#[derive(Clone)]
pub struct Edge {
    /// Source node id
    pub source: NodeId,

    /// Target node id
    pub target: NodeId,

    /// Guard; `None` means unconditional (always matches)
    pub predicate: Option<EdgePredicate>,

    /// Human-readable label, carried into routing events
    pub label: Option<String>,

    /// Registration index among the source's edges; the first-match
    /// tie-break
    pub order: usize,

    /// Ceiling on how often this edge may be taken in one execution
    ///
    /// Once the ceiling is reached the edge stops matching, which is how
    /// loop back-edges are bounded independently of their condition.
    pub max_traversals: Option<u64>,
}

impl Edge {
    /// Unconditional edge
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            predicate: None,
            label: None,
            order: 0,
            max_traversals: None,
        }
    }

    /// Guarded edge
    pub fn conditional(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        predicate: impl Fn(&State) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            predicate: Some(Arc::new(predicate)),
            ..Self::new(source, target)
        }
    }

    /// Attach a label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bound how often this edge may be taken in one execution
    pub fn with_max_traversals(mut self, max: u64) -> Self {
        self.max_traversals = Some(max);
        self
    }

    /// Whether this edge matches any state
    pub fn is_unconditional(&self) -> bool {
        self.predicate.is_none()
    }

    /// Traversal-count key for this edge
    pub fn key(&self) -> EdgeKey {
        (self.source.clone(), self.order)
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Edge")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("label", &self.label)
            .field("order", &self.order)
            .field("max_traversals", &self.max_traversals)
            .finish()
    }
}

/// How a parallel group decides the fan-in is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// Wait for every branch to reach the join (default)
    All,

    /// Proceed once at least `n` branches reached the join; remaining
    /// branches still settle but failed stragglers no longer fail the run
    Quorum(usize),
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self::All
    }
}

/// The outgoing-edge shape of one node
#[derive(Clone, Debug)]
pub enum EdgeGroup {
    /// Ordered guarded edges; first match wins
    FirstMatch(Vec<Edge>),

    /// Concurrent fan-out converging at `join`
    Parallel {
        branches: Vec<Edge>,
        join: NodeId,
        policy: JoinPolicy,
    },
}

/// Routing decision for one step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Single successor chosen by first match
    Next {
        target: NodeId,
        /// Registration index of the matching edge (for traversal counting)
        order: usize,
    },

    /// Concurrent fan-out
    Parallel {
        branches: Vec<NodeId>,
        join: NodeId,
        policy: JoinPolicy,
    },

    /// Edges existed but none matched
    DeadEnd,

    /// No outgoing edges at all
    Terminal,
}

/// Stateless first-match edge resolution
pub struct Router;

impl Router {
    /// Resolve the next hop for a node
    ///
    /// `edge_counts` carries how often each bounded edge has already been
    /// taken this execution; an edge at its ceiling is skipped without
    /// evaluating its predicate. `on_eval` observes every predicate
    /// evaluation (for `ConditionEvaluated` events) — unguarded matches are
    /// not reported since nothing was evaluated.
    pub fn resolve(
        group: Option<&EdgeGroup>,
        state: &State,
        edge_counts: &HashMap<EdgeKey, u64>,
        mut on_eval: impl FnMut(&Edge, bool),
    ) -> Route {
        let group = match group {
            Some(group) => group,
            None => return Route::Terminal,
        };

        match group {
            EdgeGroup::FirstMatch(edges) => {
                if edges.is_empty() {
                    return Route::Terminal;
                }

                for edge in edges {
                    if let Some(max) = edge.max_traversals {
                        let taken = edge_counts.get(&edge.key()).copied().unwrap_or(0);
                        if taken >= max {
                            continue;
                        }
                    }

                    let matched = match &edge.predicate {
                        None => true,
                        Some(predicate) => {
                            let result = predicate(state);
                            on_eval(edge, result);
                            result
                        }
                    };

                    if matched {
                        return Route::Next {
                            target: edge.target.clone(),
                            order: edge.order,
                        };
                    }
                }

                Route::DeadEnd
            }
            EdgeGroup::Parallel {
                branches,
                join,
                policy,
            } => Route::Parallel {
                branches: branches.iter().map(|e| e.target.clone()).collect(),
                join: join.clone(),
                policy: *policy,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn counts() -> HashMap<EdgeKey, u64> {
        HashMap::new()
    }

    fn first_match(edges: Vec<Edge>) -> EdgeGroup {
        let edges = edges
            .into_iter()
            .enumerate()
            .map(|(i, mut e)| {
                e.order = i;
                e
            })
            .collect();
        EdgeGroup::FirstMatch(edges)
    }

    #[test]
    fn first_matching_predicate_wins() {
        let group = first_match(vec![
            Edge::conditional("s", "adult", |s: &State| {
                s.get_i64("age").map(|age| age >= 18).unwrap_or(false)
            }),
            Edge::new("s", "minor"),
        ]);

        let adult = State::with_entries([("age", json!(30))]);
        let minor = State::with_entries([("age", json!(17))]);

        assert_eq!(
            Router::resolve(Some(&group), &adult, &counts(), |_, _| {}),
            Route::Next { target: "adult".to_string(), order: 0 }
        );
        assert_eq!(
            Router::resolve(Some(&group), &minor, &counts(), |_, _| {}),
            Route::Next { target: "minor".to_string(), order: 1 }
        );
    }

    #[test]
    fn registration_order_breaks_ties() {
        let group = first_match(vec![
            Edge::conditional("s", "first", |_| true),
            Edge::conditional("s", "second", |_| true),
        ]);

        let route = Router::resolve(Some(&group), &State::new(), &counts(), |_, _| {});
        assert_eq!(route, Route::Next { target: "first".to_string(), order: 0 });
    }

    #[test]
    fn missing_key_routes_to_fallback() {
        // Absence is a branchable condition, not a fault.
        let group = first_match(vec![
            Edge::conditional("s", "known", |s: &State| s.contains_key("user")),
            Edge::new("s", "anonymous"),
        ]);

        let route = Router::resolve(Some(&group), &State::new(), &counts(), |_, _| {});
        assert_eq!(route, Route::Next { target: "anonymous".to_string(), order: 1 });
    }

    #[test]
    fn no_match_is_dead_end_not_terminal() {
        let group = first_match(vec![Edge::conditional("s", "t", |_| false)]);

        assert_eq!(
            Router::resolve(Some(&group), &State::new(), &counts(), |_, _| {}),
            Route::DeadEnd
        );
        assert_eq!(
            Router::resolve(None, &State::new(), &counts(), |_, _| {}),
            Route::Terminal
        );
    }

    #[test]
    fn exhausted_edge_is_skipped_without_evaluation() {
        let group = first_match(vec![
            Edge::conditional("s", "again", |_| true).with_max_traversals(2),
            Edge::new("s", "done"),
        ]);

        let mut evaluations = 0;
        let mut edge_counts = counts();
        edge_counts.insert(("s".to_string(), 0), 2);

        let route = Router::resolve(Some(&group), &State::new(), &edge_counts, |_, _| {
            evaluations += 1;
        });
        assert_eq!(route, Route::Next { target: "done".to_string(), order: 1 });
        assert_eq!(evaluations, 0);
    }

    #[test]
    fn eval_observer_sees_each_predicate() {
        let group = first_match(vec![
            Edge::conditional("s", "a", |_| false).with_label("to-a"),
            Edge::conditional("s", "b", |_| true),
        ]);

        let mut seen = Vec::new();
        Router::resolve(Some(&group), &State::new(), &counts(), |edge, result| {
            seen.push((edge.target.clone(), result));
        });
        assert_eq!(seen, vec![("a".to_string(), false), ("b".to_string(), true)]);
    }

    #[test]
    fn parallel_group_returns_all_branches_in_order() {
        let group = EdgeGroup::Parallel {
            branches: vec![Edge::new("s", "left"), Edge::new("s", "right")],
            join: "merge".to_string(),
            policy: JoinPolicy::All,
        };

        let route = Router::resolve(Some(&group), &State::new(), &counts(), |_, _| {});
        assert_eq!(
            route,
            Route::Parallel {
                branches: vec!["left".to_string(), "right".to_string()],
                join: "merge".to_string(),
                policy: JoinPolicy::All,
            }
        );
    }

    proptest! {
        /// Identical state and edge set always resolve to the identical
        /// target, however often the router runs.
        #[test]
        fn resolution_is_deterministic(age in -5i64..50, threshold in 0i64..40) {
            let group = first_match(vec![
                Edge::conditional("s", "over", move |s: &State| {
                    s.get_i64("age").map(|a| a >= threshold).unwrap_or(false)
                }),
                Edge::conditional("s", "under", |_| true),
            ]);
            let state = State::with_entries([("age", json!(age))]);

            let first = Router::resolve(Some(&group), &state, &counts(), |_, _| {});
            for _ in 0..10 {
                let again = Router::resolve(Some(&group), &state, &counts(), |_, _| {});
                prop_assert_eq!(&first, &again);
            }
        }
    }
}
