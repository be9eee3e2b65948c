//! Inbound port used by block handlers.

use crate::domain::errors::StateError;
use crate::domain::state::StateBag;
use serde_json::{Map, Value};
use shared_types::entities::BlockId;

pub trait UserStateApi: Send + Sync {
    /// Current bag, created from the block defaults on first access.
    fn get(&self, block_id: &BlockId, user: &str) -> StateBag;

    /// Partial merge of `patch`; clears the restore slot.
    fn set(&self, block_id: &BlockId, user: &str, patch: Value) -> Result<StateBag, StateError>;

    /// Stash a value to show back to `user` without resubmission.
    fn stash_restore(&self, block_id: &BlockId, user: &str, value: Value);

    /// Toggle the `active` flag without touching the restore slot.
    fn set_active(&self, block_id: &BlockId, user: &str, active: bool);

    fn register_defaults(&self, block_id: &BlockId, defaults: Map<String, Value>);
}
