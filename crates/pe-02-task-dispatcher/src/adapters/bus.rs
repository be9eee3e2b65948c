//! Shared-bus adapters: `PUSH_TASK` out, `TASK_COMPLETE_BROADCAST` in.

use crate::domain::entities::CompletionOutcome;
use crate::ports::outbound::{ChannelError, TaskChannel};
use crate::service::TaskDispatcher;
use async_trait::async_trait;
use shared_bus::{EngineEvent, EventPublisher, Subscription};
use shared_types::ipc::PushTaskPayload;
use std::sync::Arc;
use tracing::{debug, info};

/// Publishes tasks on the bus for the worker pool.
pub struct BusTaskChannel {
    bus: Arc<dyn EventPublisher>,
}

impl BusTaskChannel {
    pub fn new(bus: Arc<dyn EventPublisher>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl TaskChannel for BusTaskChannel {
    async fn push_task(&self, payload: PushTaskPayload) -> Result<(), ChannelError> {
        let task_id = payload.task.id;
        let receivers = self.bus.publish(EngineEvent::PushTask(payload)).await;
        if receivers == 0 {
            return Err(ChannelError(format!(
                "no worker pool subscribed for task {task_id}"
            )));
        }
        Ok(())
    }
}

/// Feed completion broadcasts into the dispatcher until the bus closes.
///
/// The subscription should be filtered to `EventTopic::TaskCompletion`.
pub async fn run_completion_listener(dispatcher: Arc<TaskDispatcher>, mut subscription: Subscription) {
    info!("[pe-02] completion listener started");
    while let Some(event) = subscription.recv().await {
        let EngineEvent::TaskComplete(completion) = event else {
            continue;
        };
        let task_id = completion.id;
        let outcome = dispatcher.handle_completion(completion).await;
        if outcome == CompletionOutcome::Ignored {
            debug!(task_id = %task_id, "[pe-02] duplicate or late completion");
        }
    }
    info!("[pe-02] completion listener stopped");
}
