//! State bag and its key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::entities::{BlockId, Did};

/// Field toggled off while a block action runs and restored on failure.
pub const ACTIVE_FIELD: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub block_id: BlockId,
    pub user: Did,
}

impl StateKey {
    pub fn new(block_id: &BlockId, user: &str) -> Self {
        Self {
            block_id: block_id.clone(),
            user: user.to_string(),
        }
    }
}

/// State of one user at one block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateBag {
    pub values: Map<String, Value>,
    /// Value shown back to the user until their next successful write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<Value>,
}

impl StateBag {
    #[must_use]
    pub fn from_defaults(defaults: &Map<String, Value>) -> Self {
        Self {
            values: defaults.clone(),
            restore: None,
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// `active` flag; a bag without one is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.values
            .get(ACTIVE_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Merge `patch` key by key; keys absent from the patch are kept.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            self.values.insert(key, value);
        }
    }

    /// Render form: the values plus `restoreData` when a restore is pending.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut values = self.values.clone();
        if let Some(restore) = &self.restore {
            values.insert("restoreData".into(), restore.clone());
        }
        Value::Object(values)
    }
}
