//! Outbound port towards the worker pool.

use async_trait::async_trait;
use shared_types::ipc::PushTaskPayload;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Task channel unavailable: {0}")]
pub struct ChannelError(pub String);

/// Request channel to the worker pool (`PUSH_TASK`).
#[async_trait]
pub trait TaskChannel: Send + Sync {
    async fn push_task(&self, payload: PushTaskPayload) -> Result<(), ChannelError>;
}
