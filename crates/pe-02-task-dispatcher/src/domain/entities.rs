//! Task dispatch entities.

use crate::domain::errors::TaskError;
use crate::DEFAULT_MAX_ATTEMPTS;
use serde_json::Value;
use shared_types::ipc::{PushTaskPayload, TaskId, WorkerTask, WorkerTaskType};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Work handed to the dispatcher by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub task_type: WorkerTaskType,
    pub data: Value,
    /// Higher runs first in the worker pool.
    pub priority: u8,
    pub retryable: bool,
    /// Attempt budget; clamped on submit.
    pub attempts: u32,
}

impl TaskRequest {
    /// A task the worker may retry, with `attempts` as budget (0 = default).
    #[must_use]
    pub fn retryable(task_type: WorkerTaskType, data: Value, priority: u8, attempts: u32) -> Self {
        Self {
            task_type,
            data,
            priority,
            retryable: true,
            attempts,
        }
    }

    /// A task that fails on the first error (network calls, non-idempotent work).
    #[must_use]
    pub fn single_attempt(task_type: WorkerTaskType, data: Value, priority: u8) -> Self {
        Self {
            task_type,
            data,
            priority,
            retryable: false,
            attempts: 0,
        }
    }
}

/// Clamp `attempts` into `(0, max]`; out-of-range values become `max`.
#[must_use]
pub fn clamp_attempts(attempts: u32, max: u32) -> u32 {
    if attempts > 0 && attempts <= max {
        attempts
    } else {
        max
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_attempts: u32,
    /// Deadline for one attempt before the task is evicted.
    pub task_timeout: Duration,
    /// Injected as `data.network` when a task does not name one.
    pub network: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            task_timeout: Duration::from_secs(600),
            network: None,
        }
    }
}

/// One outstanding task. Exactly one exists per task id while pending.
pub(crate) struct ActiveTask {
    pub task: WorkerTask,
    pub priority: u8,
    pub retryable: bool,
    pub attempts: u32,
    pub attempts_made: u32,
    pub sender: oneshot::Sender<Result<Value, TaskError>>,
    pub started_at: Instant,
    pub timeout: Duration,
}

impl ActiveTask {
    pub fn push_payload(&self) -> PushTaskPayload {
        PushTaskPayload {
            task: self.task.clone(),
            priority: self.priority,
            is_retryable_task: self.retryable,
            attempts: self.attempts,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retryable && self.attempts_made < self.attempts
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.started_at) > self.timeout
    }

    pub fn id(&self) -> TaskId {
        self.task.id
    }
}

/// What `handle_completion` did with a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The caller received the task data.
    Resolved,
    /// The task was re-pushed under the same id.
    Retried,
    /// The caller received an error.
    Rejected,
    /// No task with that id is pending.
    Ignored,
}
