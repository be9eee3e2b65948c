//! # Task Dispatcher Service
//!
//! Correlates worker completions with waiting callers.

use crate::domain::entities::{
    clamp_attempts, ActiveTask, CompletionOutcome, DispatcherConfig, TaskRequest,
};
use crate::domain::errors::TaskError;
use crate::domain::stats::{DispatcherStats, StatsSnapshot};
use crate::ports::inbound::TaskSubmitter;
use crate::ports::outbound::TaskChannel;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use shared_types::ipc::{TaskCompletePayload, TaskId, WorkerTask, WorkerTaskType};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A submitted task whose result has not been awaited yet.
pub struct PendingTask {
    pub id: TaskId,
    receiver: oneshot::Receiver<Result<Value, TaskError>>,
}

impl PendingTask {
    /// Wait for the task to settle.
    pub async fn wait(self) -> Result<Value, TaskError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(TaskError::Dropped { task_id: self.id }),
        }
    }
}

/// Owner of the task correlation map.
pub struct TaskDispatcher {
    pending: DashMap<TaskId, ActiveTask>,
    channel: Arc<dyn TaskChannel>,
    config: DispatcherConfig,
    stats: DispatcherStats,
}

impl TaskDispatcher {
    pub fn new(channel: Arc<dyn TaskChannel>, config: DispatcherConfig) -> Self {
        Self {
            pending: DashMap::new(),
            channel,
            config,
            stats: DispatcherStats::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Record the task and push it to the worker pool.
    pub async fn enqueue(&self, request: TaskRequest) -> Result<PendingTask, TaskError> {
        let id = TaskId::new();
        let attempts = clamp_attempts(request.attempts, self.config.max_attempts);
        let data = self.with_network(request.data);
        let (sender, receiver) = oneshot::channel();

        let active = ActiveTask {
            task: WorkerTask {
                id,
                task_type: request.task_type,
                data,
            },
            priority: request.priority,
            retryable: request.retryable,
            attempts,
            attempts_made: 0,
            sender,
            started_at: Instant::now(),
            timeout: self.config.task_timeout,
        };
        let payload = active.push_payload();
        self.pending.insert(id, active);
        DispatcherStats::bump(&self.stats.total_submitted);

        debug!(
            task_id = %id,
            task_type = %request.task_type,
            priority = request.priority,
            retryable = request.retryable,
            attempts = attempts,
            "[pe-02] task submitted"
        );

        if let Err(e) = self.channel.push_task(payload).await {
            self.pending.remove(&id);
            DispatcherStats::bump(&self.stats.total_rejected);
            warn!(task_id = %id, error = %e, "[pe-02] failed to push task");
            return Err(TaskError::Publish {
                task_id: id,
                reason: e.to_string(),
            });
        }

        Ok(PendingTask { id, receiver })
    }

    /// Handle one `TASK_COMPLETE_BROADCAST`.
    pub async fn handle_completion(&self, completion: TaskCompletePayload) -> CompletionOutcome {
        let Some((id, mut active)) = self.pending.remove(&completion.id) else {
            DispatcherStats::bump(&self.stats.total_ignored);
            debug!(task_id = %completion.id, "[pe-02] completion for unknown task ignored");
            return CompletionOutcome::Ignored;
        };

        let Some(message) = completion.error else {
            let data = completion.data.unwrap_or(Value::Null);
            debug!(
                task_id = %id,
                task_type = %active.task.task_type,
                elapsed_ms = active.started_at.elapsed().as_millis() as u64,
                "[pe-02] task resolved"
            );
            DispatcherStats::bump(&self.stats.total_resolved);
            self.settle(active, Ok(data));
            return CompletionOutcome::Resolved;
        };

        if active.can_retry() {
            active.attempts_made += 1;
            active.started_at = Instant::now();
            let payload = active.push_payload();
            info!(
                task_id = %id,
                task_type = %active.task.task_type,
                attempt = active.attempts_made,
                budget = active.attempts,
                error = %message,
                "[pe-02] task failed, retrying"
            );
            self.pending.insert(id, active);
            DispatcherStats::bump(&self.stats.total_retried);

            if let Err(e) = self.channel.push_task(payload).await {
                if let Some((_, active)) = self.pending.remove(&id) {
                    DispatcherStats::bump(&self.stats.total_rejected);
                    self.settle(
                        active,
                        Err(TaskError::Publish {
                            task_id: id,
                            reason: e.to_string(),
                        }),
                    );
                }
                return CompletionOutcome::Rejected;
            }
            return CompletionOutcome::Retried;
        }

        warn!(
            task_id = %id,
            task_type = %active.task.task_type,
            attempts = active.attempts_made + 1,
            error = %message,
            "[pe-02] task failed"
        );
        let error = TaskError::Failed {
            task_id: id,
            task_type: active.task.task_type,
            attempts: active.attempts_made + 1,
            message,
        };
        DispatcherStats::bump(&self.stats.total_rejected);
        self.settle(active, Err(error));
        CompletionOutcome::Rejected
    }

    /// Reject every task whose current attempt outlived its deadline.
    ///
    /// Returns the number of tasks evicted.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<TaskId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        let mut evicted = 0;
        for id in expired {
            // Re-check under the entry lock: a completion may have won the race.
            let Some((_, active)) = self.pending.remove_if(&id, |_, task| task.is_expired(now))
            else {
                continue;
            };
            let waited_ms = now.duration_since(active.started_at).as_millis() as u64;
            warn!(
                task_id = %id,
                task_type = %active.task.task_type,
                waited_ms = waited_ms,
                "[pe-02] evicting task without completion"
            );
            let error = TaskError::Evicted {
                task_id: id,
                task_type: active.task.task_type,
                waited_ms,
            };
            DispatcherStats::bump(&self.stats.total_evicted);
            self.settle(active, Err(error));
            evicted += 1;
        }
        evicted
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, id: &TaskId) -> bool {
        self.pending.contains_key(id)
    }

    /// Attempts already retried for a pending task.
    #[must_use]
    pub fn attempts_made(&self, id: &TaskId) -> Option<u32> {
        self.pending.get(id).map(|entry| entry.attempts_made)
    }

    /// Type of a pending task.
    #[must_use]
    pub fn task_type(&self, id: &TaskId) -> Option<WorkerTaskType> {
        self.pending.get(id).map(|entry| entry.task.task_type)
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.pending.len())
    }

    fn settle(&self, active: ActiveTask, result: Result<Value, TaskError>) {
        let id = active.id();
        if active.sender.send(result).is_err() {
            DispatcherStats::bump(&self.stats.total_abandoned);
            debug!(task_id = %id, "[pe-02] caller dropped before task settled");
        }
    }

    fn with_network(&self, mut data: Value) -> Value {
        if let (Some(network), Some(object)) = (&self.config.network, data.as_object_mut()) {
            object
                .entry("network")
                .or_insert_with(|| Value::String(network.clone()));
        }
        data
    }
}

#[async_trait]
impl TaskSubmitter for TaskDispatcher {
    async fn submit(&self, request: TaskRequest) -> Result<Value, TaskError> {
        self.enqueue(request).await?.wait().await
    }
}

/// Background loop that evicts expired tasks.
pub async fn eviction_task(dispatcher: Arc<TaskDispatcher>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let evicted = dispatcher.evict_expired();
        if evicted > 0 {
            info!(evicted = evicted, "[pe-02] evicted expired tasks");
        }
    }
}
