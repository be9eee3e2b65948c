//! Dispatcher errors.

use shared_types::ipc::{TaskId, WorkerTaskType};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    /// The worker reported an error and the attempt budget is spent.
    #[error("{task_type} task {task_id} failed after {attempts} attempt(s): {message}")]
    Failed {
        task_id: TaskId,
        task_type: WorkerTaskType,
        attempts: u32,
        message: String,
    },

    /// No completion arrived before the deadline.
    #[error("{task_type} task {task_id} evicted after {waited_ms}ms without completion")]
    Evicted {
        task_id: TaskId,
        task_type: WorkerTaskType,
        waited_ms: u64,
    },

    /// The task could not be handed to the worker pool.
    #[error("Failed to push task {task_id}: {reason}")]
    Publish { task_id: TaskId, reason: String },

    /// The dispatcher went away before the task settled.
    #[error("Task {task_id} dropped before completion")]
    Dropped { task_id: TaskId },
}

impl TaskError {
    #[must_use]
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Failed { task_id, .. }
            | Self::Evicted { task_id, .. }
            | Self::Publish { task_id, .. }
            | Self::Dropped { task_id } => *task_id,
        }
    }
}
