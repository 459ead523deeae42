//! The state container threaded through graph execution
//!
//! [`State`] is a versioned key→value map that flows from node to node during
//! a run. Nodes read the keys they document, write the keys they own, and the
//! executor hands the container onward — there is no other channel between
//! nodes. Keys map to arbitrary [`serde_json::Value`]s; iteration and
//! serialization order is deterministic (`BTreeMap`), which is what makes
//! checkpoints comparable and routing reproducible.
//!
//! Reading an absent key is a legitimate outcome, not a fault:
//! [`State::get`] returns the typed [`StateError::MissingKey`] so routers and
//! nodes can branch on absence, and [`State::try_get`] gives the plain
//! `Option` form for predicates.
//!
//! The container is cloned only at explicit isolation points: parallel
//! fork, `IsolatedClone` subgraphs, and snapshots. Everywhere else the single
//! instance moves through the run by ownership transfer.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::state::{State, StateError};
//! use serde_json::json;
//!
//! let mut state = State::new();
//! state.set("age", json!(17));
//!
//! assert_eq!(state.get_i64("age").unwrap(), 17);
//! assert!(matches!(state.get("name"), Err(StateError::MissingKey(_))));
//! assert_eq!(state.version(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Typed outcomes for state reads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The key has never been written (or was removed)
    #[error("Missing key '{0}'")]
    MissingKey(String),

    /// The key exists but holds a different JSON kind than requested
    #[error("Key '{key}' holds a {actual}, expected {expected}")]
    WrongKind {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// How conflicting keys are resolved when two states merge
///
/// Merging happens at exactly two boundaries: when parallel branches rejoin
/// and when a subgraph's output returns to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the value already present; incoming writes to existing keys are
    /// ignored
    PreferExisting,

    /// Incoming writes overwrite existing values
    PreferIncoming,

    /// Combine values structurally: arrays concatenate, objects deep-merge
    /// (incoming wins inside), anything else takes the incoming value
    Combine,
}

/// Versioned key→value container flowing through an execution
///
/// Every write bumps the monotonic version counter, so two snapshots of the
/// same logical state are comparable by `(id, version)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct State {
    id: Uuid,
    entries: BTreeMap<String, Value>,
    version: u64,
    created_at: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

impl State {
    /// Create an empty state with a fresh id and version 0
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: BTreeMap::new(),
            version: 0,
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create a state pre-populated with entries
    ///
    /// Each entry counts as one write, so the version equals the number of
    /// entries supplied.
    pub fn with_entries<K>(entries: impl IntoIterator<Item = (K, Value)>) -> Self
    where
        K: Into<String>,
    {
        let mut state = Self::new();
        for (key, value) in entries {
            state.set(key, value);
        }
        state
    }

    /// Unique id of this state container
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Monotonic write counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of keys currently present
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the state holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate keys in deterministic order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Iterate entries in deterministic order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read a key, with absence as a typed outcome
    pub fn get(&self, key: &str) -> std::result::Result<&Value, StateError> {
        self.entries
            .get(key)
            .ok_or_else(|| StateError::MissingKey(key.to_string()))
    }

    /// Read a key as a plain `Option` (predicate-friendly)
    pub fn try_get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Read a key expecting a string
    pub fn get_str(&self, key: &str) -> std::result::Result<&str, StateError> {
        let value = self.get(key)?;
        value.as_str().ok_or_else(|| StateError::WrongKind {
            key: key.to_string(),
            expected: "string",
            actual: json_kind(value),
        })
    }

    /// Read a key expecting an integer
    pub fn get_i64(&self, key: &str) -> std::result::Result<i64, StateError> {
        let value = self.get(key)?;
        value.as_i64().ok_or_else(|| StateError::WrongKind {
            key: key.to_string(),
            expected: "integer",
            actual: json_kind(value),
        })
    }

    /// Read a key expecting a float (integers coerce)
    pub fn get_f64(&self, key: &str) -> std::result::Result<f64, StateError> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| StateError::WrongKind {
            key: key.to_string(),
            expected: "number",
            actual: json_kind(value),
        })
    }

    /// Read a key expecting a boolean
    pub fn get_bool(&self, key: &str) -> std::result::Result<bool, StateError> {
        let value = self.get(key)?;
        value.as_bool().ok_or_else(|| StateError::WrongKind {
            key: key.to_string(),
            expected: "boolean",
            actual: json_kind(value),
        })
    }

    /// Insert or overwrite a key, bumping the version
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
        self.version += 1;
    }

    /// Remove a key; bumps the version only when something was removed
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    /// Attach a metadata entry (source, schema version, ...)
    ///
    /// Metadata is carried alongside the entries but does not participate in
    /// versioning or merging.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Read a metadata entry
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|v| v.as_str())
    }

    /// Take an immutable snapshot of the current contents
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            id: self.id,
            entries: self.entries.clone(),
            version: self.version,
            created_at: self.created_at,
            metadata: self.metadata.clone(),
        }
    }

    /// Merge another state's entries into this one
    ///
    /// Keys only present in `other` are always taken; keys present in both
    /// are resolved by `policy`. Metadata is not merged. Each applied write
    /// bumps the version once.
    pub fn merge(&mut self, other: &State, policy: ConflictPolicy) {
        for (key, incoming) in &other.entries {
            match self.entries.get(key) {
                None => {
                    self.set(key.clone(), incoming.clone());
                }
                Some(existing) => match policy {
                    ConflictPolicy::PreferExisting => {}
                    ConflictPolicy::PreferIncoming => {
                        self.set(key.clone(), incoming.clone());
                    }
                    ConflictPolicy::Combine => {
                        let combined = combine_values(existing, incoming);
                        self.set(key.clone(), combined);
                    }
                },
            }
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of a state's contents at one point in time
///
/// Snapshots serialize into checkpoints; [`restore`](StateSnapshot::restore)
/// rebuilds a [`State`] with the same id and version, so a resumed execution
/// continues the original container's identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    id: Uuid,
    entries: BTreeMap<String, Value>,
    version: u64,
    created_at: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

impl StateSnapshot {
    /// Id of the state this snapshot was taken from
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Version at snapshot time
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Read a key from the snapshot
    pub fn try_get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Rebuild a live state from this snapshot
    pub fn restore(self) -> State {
        State {
            id: self.id,
            entries: self.entries,
            version: self.version,
            created_at: self.created_at,
            metadata: self.metadata,
        }
    }
}

/// Structural combine used by [`ConflictPolicy::Combine`]
///
/// Arrays concatenate (existing first), objects merge key-wise with incoming
/// winning on nested conflicts, everything else takes the incoming value.
fn combine_values(existing: &Value, incoming: &Value) -> Value {
    match (existing, incoming) {
        (Value::Array(left), Value::Array(right)) => {
            let mut combined = left.clone();
            combined.extend(right.iter().cloned());
            Value::Array(combined)
        }
        (Value::Object(left), Value::Object(right)) => {
            let mut combined = left.clone();
            for (key, right_value) in right {
                match combined.get(key) {
                    Some(left_value) => {
                        let merged = combine_values(left_value, right_value);
                        combined.insert(key.clone(), merged);
                    }
                    None => {
                        combined.insert(key.clone(), right_value.clone());
                    }
                }
            }
            Value::Object(combined)
        }
        (_, incoming) => incoming.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get() {
        let mut state = State::new();
        state.set("count", json!(3));

        assert_eq!(state.get("count").unwrap(), &json!(3));
        assert_eq!(state.get_i64("count").unwrap(), 3);
    }

    #[test]
    fn missing_key_is_typed() {
        let state = State::new();
        assert_eq!(
            state.get("absent"),
            Err(StateError::MissingKey("absent".to_string()))
        );
        assert!(state.try_get("absent").is_none());
    }

    #[test]
    fn wrong_kind_is_typed() {
        let mut state = State::new();
        state.set("name", json!("alice"));

        assert!(matches!(
            state.get_i64("name"),
            Err(StateError::WrongKind { expected: "integer", actual: "string", .. })
        ));
    }

    #[test]
    fn version_increments_per_write() {
        let mut state = State::new();
        assert_eq!(state.version(), 0);

        state.set("a", json!(1));
        state.set("a", json!(2));
        state.set("b", json!(3));
        assert_eq!(state.version(), 3);

        state.remove("b");
        assert_eq!(state.version(), 4);

        // Removing an absent key is not a write.
        state.remove("b");
        assert_eq!(state.version(), 4);
    }

    #[test]
    fn keys_iterate_in_deterministic_order() {
        let mut state = State::new();
        state.set("zebra", json!(1));
        state.set("apple", json!(2));
        state.set("mango", json!(3));

        let keys: Vec<&str> = state.keys().collect();
        assert_eq!(keys, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn snapshot_restore_preserves_identity() {
        let mut state = State::new();
        state.set("k", json!("v"));
        state.set_metadata("source", "test");

        let snapshot = state.snapshot();
        let restored = snapshot.restore();

        assert_eq!(restored.id(), state.id());
        assert_eq!(restored.version(), state.version());
        assert_eq!(restored.get("k").unwrap(), &json!("v"));
        assert_eq!(restored.metadata("source"), Some("test"));
    }

    #[test]
    fn snapshot_is_immune_to_later_writes() {
        let mut state = State::new();
        state.set("k", json!(1));
        let snapshot = state.snapshot();

        state.set("k", json!(2));
        assert_eq!(snapshot.try_get("k"), Some(&json!(1)));
    }

    #[test]
    fn merge_prefer_existing() {
        let mut left = State::with_entries([("shared", json!("left")), ("only_left", json!(1))]);
        let right = State::with_entries([("shared", json!("right")), ("only_right", json!(2))]);

        left.merge(&right, ConflictPolicy::PreferExisting);

        assert_eq!(left.get("shared").unwrap(), &json!("left"));
        assert_eq!(left.get("only_right").unwrap(), &json!(2));
    }

    #[test]
    fn merge_prefer_incoming() {
        let mut left = State::with_entries([("shared", json!("left"))]);
        let right = State::with_entries([("shared", json!("right"))]);

        left.merge(&right, ConflictPolicy::PreferIncoming);
        assert_eq!(left.get("shared").unwrap(), &json!("right"));
    }

    #[test]
    fn merge_combine_concatenates_arrays() {
        let mut left = State::with_entries([("items", json!([1, 2]))]);
        let right = State::with_entries([("items", json!([3]))]);

        left.merge(&right, ConflictPolicy::Combine);
        assert_eq!(left.get("items").unwrap(), &json!([1, 2, 3]));
    }

    #[test]
    fn merge_combine_deep_merges_objects() {
        let mut left = State::with_entries([(
            "config",
            json!({"retries": 3, "nested": {"a": 1}}),
        )]);
        let right = State::with_entries([(
            "config",
            json!({"timeout": 30, "nested": {"b": 2}}),
        )]);

        left.merge(&right, ConflictPolicy::Combine);
        assert_eq!(
            left.get("config").unwrap(),
            &json!({"retries": 3, "timeout": 30, "nested": {"a": 1, "b": 2}})
        );
    }

    #[test]
    fn merge_combine_scalars_take_incoming() {
        let mut left = State::with_entries([("score", json!(1))]);
        let right = State::with_entries([("score", json!(9))]);

        left.merge(&right, ConflictPolicy::Combine);
        assert_eq!(left.get("score").unwrap(), &json!(9));
    }

    #[test]
    fn state_serializes_roundtrip() {
        let mut state = State::new();
        state.set("k", json!({"nested": [1, 2, 3]}));

        let bytes = serde_json::to_vec(&state).unwrap();
        let restored: State = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, state);
    }
}
