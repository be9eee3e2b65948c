//! # Embedded Worker
//!
//! Answers `PUSH_TASK` on the bus with `TASK_COMPLETE_BROADCAST`, so a
//! single process can run policies without an external worker pool.
//! Ledger operations succeed without touching a network; outbound HTTP is
//! refused.

use serde_json::{json, Value};
use shared_bus::{EngineEvent, EventPublisher, Subscription};
use shared_types::ipc::{TaskCompletePayload, WorkerTask, WorkerTaskType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub struct EmbeddedWorker {
    bus: Arc<dyn EventPublisher>,
    next_serial: AtomicU64,
}

impl EmbeddedWorker {
    pub fn new(bus: Arc<dyn EventPublisher>) -> Self {
        Self {
            bus,
            next_serial: AtomicU64::new(1),
        }
    }

    /// Result the worker reports for `task`.
    pub fn execute(&self, task: &WorkerTask) -> TaskCompletePayload {
        match task.task_type {
            WorkerTaskType::MintNft => {
                let count = task
                    .data
                    .get("metaData")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len) as u64;
                let start = self.next_serial.fetch_add(count, Ordering::SeqCst);
                TaskCompletePayload::success(task.id, json!((start..start + count).collect::<Vec<_>>()))
            }
            WorkerTaskType::TransferNft
            | WorkerTaskType::MintFt
            | WorkerTaskType::TransferFt
            | WorkerTaskType::WipeToken => {
                TaskCompletePayload::success(task.id, json!({ "status": "SUCCESS" }))
            }
            WorkerTaskType::HttpRequest => TaskCompletePayload::failure(
                task.id,
                "HTTP_REQUEST is not available to the embedded worker",
            ),
        }
    }

    /// Serve tasks until the bus closes.
    ///
    /// The subscription should be filtered to `EventTopic::WorkerTasks`.
    pub async fn run(self: Arc<Self>, mut subscription: Subscription) {
        info!("[worker] embedded worker started");
        while let Some(event) = subscription.recv().await {
            let EngineEvent::PushTask(push) = event else {
                continue;
            };
            let reply = self.execute(&push.task);
            debug!(
                task_id = %push.task.id,
                task_type = %push.task.task_type,
                ok = reply.error.is_none(),
                "[worker] task answered"
            );
            self.bus.publish(EngineEvent::TaskComplete(reply)).await;
        }
        info!("[worker] embedded worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_bus::InMemoryEventBus;
    use shared_types::ipc::TaskId;

    fn task(task_type: WorkerTaskType, data: Value) -> WorkerTask {
        WorkerTask {
            id: TaskId::new(),
            task_type,
            data,
        }
    }

    #[test]
    fn test_nft_serials_are_sequential() {
        let worker = EmbeddedWorker::new(Arc::new(InMemoryEventBus::new()));
        let first = worker.execute(&task(WorkerTaskType::MintNft, json!({"metaData": ["a", "b"]})));
        let second = worker.execute(&task(WorkerTaskType::MintNft, json!({"metaData": ["c"]})));
        assert_eq!(first.data, Some(json!([1, 2])));
        assert_eq!(second.data, Some(json!([3])));
    }

    #[test]
    fn test_http_is_refused() {
        let worker = EmbeddedWorker::new(Arc::new(InMemoryEventBus::new()));
        let reply = worker.execute(&task(WorkerTaskType::HttpRequest, json!({})));
        assert!(reply.error.is_some());
        assert!(reply.data.is_none());
    }
}
