//! What a block handler sees while it runs.

use crate::domain::errors::EngineError;
use crate::domain::event::EventActors;
use crate::domain::tree::BlockNode;
use crate::ports::outbound::EngineServices;
use crate::registry::PolicyInstance;
use crate::service::PolicyEngine;
use pe_04_user_state::{StateBag, UserStateApi};
use serde_json::Value;
use shared_bus::{EngineEvent, ExternalEvent, ExternalEventType};
use shared_types::entities::output_events::{REFRESH_EVENT, RELEASE_EVENT, RUN_EVENT};
use shared_types::entities::{DocumentPayload, PolicyUser, Schema};
use shared_types::errors::BlockActionError;
use std::sync::Arc;
use tracing::warn;

pub struct BlockContext<'a> {
    pub engine: &'a PolicyEngine,
    pub instance: &'a Arc<PolicyInstance>,
    pub index: usize,
}

impl<'a> BlockContext<'a> {
    #[must_use]
    pub fn node(&self) -> &'a BlockNode {
        self.instance.tree.node(self.index)
    }

    #[must_use]
    pub fn services(&self) -> &'a EngineServices {
        self.engine.services()
    }

    #[must_use]
    pub fn policy_id(&self) -> &'a str {
        &self.instance.policy_id
    }

    /// Block-scoped failure shown to the user.
    pub fn action_error(&self, message: impl Into<String>) -> EngineError {
        let node = self.node();
        EngineError::BlockAction(BlockActionError::new(
            node.block_type(),
            node.id.to_string(),
            message,
        ))
    }

    #[must_use]
    pub fn state(&self, user: &PolicyUser) -> StateBag {
        self.instance.state.get(&self.node().id, user.id())
    }

    pub fn set_state(&self, user: &PolicyUser, patch: Value) -> Result<StateBag, EngineError> {
        Ok(self.instance.state.set(&self.node().id, user.id(), patch)?)
    }

    pub fn set_active(&self, user: &PolicyUser, active: bool) {
        self.instance.state.set_active(&self.node().id, user.id(), active);
    }

    /// Resolve a schema IRI against the policy topic.
    pub async fn schema(&self, iri: &str) -> Result<Schema, EngineError> {
        self.services()
            .schemas
            .get_schema_by_iri(iri, self.instance.topic_id.as_deref())
            .await?
            .ok_or_else(|| self.action_error("Waiting for schema"))
    }

    /// Route `output` along this block's edges.
    pub async fn trigger(
        &self,
        output: &str,
        actors: &EventActors,
        data: Option<DocumentPayload>,
    ) -> Result<usize, EngineError> {
        self.engine
            .trigger_events(self.instance, self.index, output, actors, data)
            .await
    }

    /// Standard completion of an action block: run, release, refresh.
    pub async fn emit_result(
        &self,
        actors: &EventActors,
        data: DocumentPayload,
    ) -> Result<(), EngineError> {
        self.trigger(RUN_EVENT, actors, Some(data)).await?;
        self.trigger(RELEASE_EVENT, actors, None).await?;
        self.trigger(REFRESH_EVENT, actors, None).await?;
        Ok(())
    }

    pub async fn block_updated(&self, user: &PolicyUser) {
        self.publish(EngineEvent::BlockUpdated {
            policy_id: self.instance.policy_id.clone(),
            block_id: self.node().id.to_string(),
            user: user.did.clone(),
        })
        .await;
    }

    pub async fn external(
        &self,
        event_type: ExternalEventType,
        user: Option<&PolicyUser>,
        data: Value,
    ) {
        let node = self.node();
        self.publish(EngineEvent::External(ExternalEvent {
            event_type,
            policy_id: self.instance.policy_id.clone(),
            block_type: node.block_type().to_string(),
            block_tag: Some(node.tag.clone()),
            user: user.map(|u| u.did.clone()),
            data,
        }))
        .await;
    }

    /// Surface a failed action to `user`.
    pub async fn report_error(&self, user: &PolicyUser, message: &str) {
        let node = self.node();
        warn!(
            policy_id = %self.instance.policy_id,
            block = %node.tag,
            user = %user.did,
            "[pe-05] block action failed: {message}"
        );
        self.publish(EngineEvent::BlockError {
            policy_id: self.instance.policy_id.clone(),
            block_type: node.block_type().to_string(),
            block_id: node.id.to_string(),
            user: user.did.clone(),
            message: message.to_string(),
        })
        .await;
    }

    async fn publish(&self, event: EngineEvent) {
        self.services().events.publish(event).await;
    }
}
