//! DashMap-backed [`UserStateApi`].

use crate::domain::errors::StateError;
use crate::domain::state::{StateBag, StateKey, ACTIVE_FIELD};
use crate::ports::inbound::UserStateApi;
use dashmap::DashMap;
use serde_json::{Map, Value};
use shared_types::entities::BlockId;
use tracing::trace;

#[derive(Default)]
pub struct UserStateStore {
    slots: DashMap<StateKey, StateBag>,
    defaults: DashMap<BlockId, Map<String, Value>>,
}

impl UserStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn default_bag(&self, block_id: &BlockId) -> StateBag {
        self.defaults
            .get(block_id)
            .map(|defaults| StateBag::from_defaults(&defaults))
            .unwrap_or_default()
    }

    /// Number of materialized slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Users holding state at `block_id`.
    #[must_use]
    pub fn users_of(&self, block_id: &BlockId) -> Vec<String> {
        self.slots
            .iter()
            .filter(|entry| &entry.key().block_id == block_id)
            .map(|entry| entry.key().user.clone())
            .collect()
    }

    /// Drop every slot of `block_id`.
    pub fn clear_block(&self, block_id: &BlockId) {
        self.slots.retain(|key, _| &key.block_id != block_id);
    }
}

impl UserStateApi for UserStateStore {
    fn get(&self, block_id: &BlockId, user: &str) -> StateBag {
        let key = StateKey::new(block_id, user);
        if let Some(bag) = self.slots.get(&key) {
            return bag.clone();
        }
        let bag = self.default_bag(block_id);
        self.slots.entry(key).or_insert(bag).clone()
    }

    fn set(&self, block_id: &BlockId, user: &str, patch: Value) -> Result<StateBag, StateError> {
        let patch = match patch {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            Value::Array(_) => return Err(StateError::NotAnObject("array")),
            Value::String(_) => return Err(StateError::NotAnObject("string")),
            Value::Number(_) => return Err(StateError::NotAnObject("number")),
            Value::Bool(_) => return Err(StateError::NotAnObject("bool")),
        };
        let default = self.default_bag(block_id);
        let mut bag = self
            .slots
            .entry(StateKey::new(block_id, user))
            .or_insert(default);
        bag.merge(patch);
        if bag.restore.take().is_some() {
            trace!("[pe-04] restore slot cleared for {} at {}", user, block_id);
        }
        Ok(bag.clone())
    }

    fn stash_restore(&self, block_id: &BlockId, user: &str, value: Value) {
        let default = self.default_bag(block_id);
        self.slots
            .entry(StateKey::new(block_id, user))
            .or_insert(default)
            .restore = Some(value);
    }

    fn set_active(&self, block_id: &BlockId, user: &str, active: bool) {
        let default = self.default_bag(block_id);
        self.slots
            .entry(StateKey::new(block_id, user))
            .or_insert(default)
            .values
            .insert(ACTIVE_FIELD.into(), Value::Bool(active));
    }

    fn register_defaults(&self, block_id: &BlockId, defaults: Map<String, Value>) {
        self.defaults.insert(block_id.clone(), defaults);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_defaults() -> (UserStateStore, BlockId) {
        let store = UserStateStore::new();
        let block = BlockId::from("block-1");
        store.register_defaults(&block, json!({"active": true}).as_object().cloned().unwrap());
        (store, block)
    }

    #[test]
    fn test_get_creates_default_bag_lazily() {
        let (store, block) = store_with_defaults();
        assert!(store.is_empty());
        let bag = store.get(&block, "did:alice");
        assert!(bag.is_active());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_is_partial_merge() {
        let (store, block) = store_with_defaults();
        store.set(&block, "did:alice", json!({"step": 1})).unwrap();
        let bag = store.set(&block, "did:alice", json!({"note": "x"})).unwrap();
        assert_eq!(bag.get("step"), Some(&json!(1)));
        assert_eq!(bag.get("note"), Some(&json!("x")));
        assert!(bag.is_active());
    }

    #[test]
    fn test_users_are_isolated() {
        let (store, block) = store_with_defaults();
        store.set(&block, "did:alice", json!({"step": 2})).unwrap();
        assert_eq!(store.get(&block, "did:bob").get("step"), None);
        let mut users = store.users_of(&block);
        users.sort();
        assert_eq!(users, vec!["did:alice".to_string(), "did:bob".to_string()]);
    }

    #[test]
    fn test_restore_slot_cleared_once_on_next_write() {
        let (store, block) = store_with_defaults();
        store.stash_restore(&block, "did:alice", json!({"field": "draft"}));

        let first = store.get(&block, "did:alice");
        assert_eq!(first.to_value()["restoreData"], json!({"field": "draft"}));
        // Reading does not consume it.
        assert!(store.get(&block, "did:alice").restore.is_some());

        let written = store.set(&block, "did:alice", json!({"submitted": true})).unwrap();
        assert!(written.restore.is_none());
        assert!(store.get(&block, "did:alice").restore.is_none());
    }

    #[test]
    fn test_set_active_keeps_restore_slot() {
        let (store, block) = store_with_defaults();
        store.stash_restore(&block, "did:alice", json!(1));
        store.set_active(&block, "did:alice", false);
        let bag = store.get(&block, "did:alice");
        assert!(!bag.is_active());
        assert!(bag.restore.is_some());
    }

    #[test]
    fn test_non_object_patch_rejected() {
        let (store, block) = store_with_defaults();
        assert_eq!(
            store.set(&block, "did:alice", json!([1])),
            Err(StateError::NotAnObject("array"))
        );
        store.clear_block(&block);
        assert!(store.is_empty());
    }
}
