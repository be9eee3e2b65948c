//! Mint orchestrator errors.

use pe_02_task_dispatcher::TaskError;
use shared_types::ipc::WorkerTaskType;
use thiserror::Error;

/// A ledger task that did not complete.
#[derive(Debug, Clone, Error)]
#[error("{task_type} failed: {source}")]
pub struct LedgerError {
    pub task_type: WorkerTaskType,
    /// Chunk index for chunked operations.
    pub chunk: Option<usize>,
    #[source]
    pub source: TaskError,
}

#[derive(Debug, Clone, Error)]
pub enum MintError {
    #[error("key custody: {0}")]
    Custody(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("no ledger account for {0}")]
    AccountNotFound(String),

    #[error("settlement store: {0}")]
    Settlement(String),

    #[error("synchronization: {0}")]
    Synchronization(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}
