//! Synchronization channel over the engine event bus.

use crate::domain::entities::SynchronizationMessage;
use crate::domain::errors::MintError;
use crate::ports::outbound::SynchronizationChannel;
use async_trait::async_trait;
use shared_bus::{EngineEvent, EventPublisher};
use shared_types::entities::LedgerAccount;
use std::sync::Arc;
use tracing::debug;

/// Publishes settlement messages as [`EngineEvent::Synchronization`].
///
/// Dry runs are published too; the bus is in-process.
pub struct BusSynchronizationChannel {
    bus: Arc<dyn EventPublisher>,
}

impl BusSynchronizationChannel {
    pub fn new(bus: Arc<dyn EventPublisher>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl SynchronizationChannel for BusSynchronizationChannel {
    async fn send(
        &self,
        topic_id: &str,
        message: &SynchronizationMessage,
        sender: &LedgerAccount,
        dry_run: bool,
    ) -> Result<(), MintError> {
        let mut body = serde_json::to_value(message)
            .map_err(|e| MintError::Synchronization(e.to_string()))?;
        if let Some(map) = body.as_object_mut() {
            map.insert("action".into(), "mint".into());
        }
        let receivers = self
            .bus
            .publish(EngineEvent::Synchronization {
                topic_id: topic_id.to_string(),
                message: body,
            })
            .await;
        debug!(
            "[pe-03] Synchronization message {} to {} from {} (dry_run={}, receivers={})",
            message.message_id, topic_id, sender.account_id, dry_run, receivers
        );
        Ok(())
    }
}
