//! Inbound port used by block handlers and the mint orchestrator.

use crate::domain::entities::TaskRequest;
use crate::domain::errors::TaskError;
use async_trait::async_trait;
use serde_json::Value;

/// Submit work to the worker pool and wait for its result.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    /// Resolves when a completion with the task's id arrives (after retries),
    /// or rejects with the final error.
    async fn submit(&self, request: TaskRequest) -> Result<Value, TaskError>;
}
