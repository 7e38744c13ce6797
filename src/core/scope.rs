//! Per-run value stores.
//!
//! [`Scope`] holds the last value produced on each `(node id, pin id)` output
//! pin; data connections are resolved against it at read time. [`Blackboard`]
//! holds graph-level variables under free-form string keys. Cloning either
//! shares the underlying store, which is how child runs opt into a parent's
//! state.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Pin-level store of last-produced output values. Last write wins.
#[derive(Clone, Default)]
pub struct Scope {
    values: Arc<RwLock<HashMap<(String, String), Value>>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, node_id: &str, pin_id: &str, value: Value) {
        self.values
            .write()
            .insert((node_id.to_string(), pin_id.to_string()), value);
    }

    pub fn get(&self, node_id: &str, pin_id: &str) -> Option<Value> {
        self.values
            .read()
            .get(&(node_id.to_string(), pin_id.to_string()))
            .cloned()
    }

    /// Flat `"nodeId:pinId" → value` view of everything written this run.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values
            .read()
            .iter()
            .map(|((node, pin), value)| (format!("{}:{}", node, pin), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

/// Graph-level variable store shared by every node of a run.
#[derive(Clone, Default)]
pub struct Blackboard {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_last_write_wins() {
        let scope = Scope::new();
        scope.set("a", "v", json!(1));
        scope.set("a", "v", json!(2));
        assert_eq!(scope.get("a", "v"), Some(json!(2)));
        assert_eq!(scope.get("a", "other"), None);
    }

    #[test]
    fn test_scope_snapshot_keys() {
        let scope = Scope::new();
        scope.set("a", "v", json!("x"));
        scope.set("b", "out", json!(null));
        let snapshot = scope.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("a:v"), Some(&json!("x")));
        assert_eq!(snapshot.get("b:out"), Some(&json!(null)));
    }

    #[test]
    fn test_scope_clone_shares_store() {
        let scope = Scope::new();
        let alias = scope.clone();
        alias.set("n", "p", json!(true));
        assert_eq!(scope.get("n", "p"), Some(json!(true)));
    }

    #[test]
    fn test_blackboard_set_get_remove() {
        let board = Blackboard::new();
        assert_eq!(board.get("k"), None);
        board.set("k", json!("v"));
        assert_eq!(board.get("k"), Some(json!("v")));
        assert_eq!(board.remove("k"), Some(json!("v")));
        assert_eq!(board.get("k"), None);
    }
}
