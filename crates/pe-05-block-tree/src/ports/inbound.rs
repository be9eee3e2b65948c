//! Inbound port: the broker-facing block operations.

use crate::domain::errors::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::entities::{BlockId, PolicyId};
use shared_types::ipc::{ExternalDataPayload, UserRef};

#[async_trait]
pub trait BlockRouter: Send + Sync {
    /// `GET_BLOCK_DATA`: render state of a block for `user`.
    async fn get_block_data(
        &self,
        policy_id: &PolicyId,
        block_id: &BlockId,
        user: &UserRef,
    ) -> Result<Value, EngineError>;

    /// `SET_BLOCK_DATA`: submit data to an interactive block.
    async fn set_block_data(
        &self,
        policy_id: &PolicyId,
        block_id: &BlockId,
        user: &UserRef,
        data: Value,
    ) -> Result<Value, EngineError>;

    /// `BLOCK_BY_TAG`.
    fn block_by_tag(&self, policy_id: &PolicyId, tag: &str) -> Result<BlockId, EngineError>;

    /// `GET_BLOCK_PARENTS`: the block first, the root last.
    fn block_parents(&self, policy_id: &PolicyId, block_id: &BlockId)
        -> Result<Vec<BlockId>, EngineError>;

    /// `RECEIVE_EXTERNAL_DATA`: number of blocks that accepted the payload.
    async fn receive_external_data(&self, payload: ExternalDataPayload)
        -> Result<usize, EngineError>;
}
