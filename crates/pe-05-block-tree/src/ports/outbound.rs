//! Collaborators the blocks call out to.

use async_trait::async_trait;
use pe_02_task_dispatcher::TaskSubmitter;
use pe_03_mint_orchestrator::TokenSettlement;
use serde_json::Value;
use shared_bus::EventPublisher;
use shared_types::entities::{Did, LedgerAccount, PolicyDocument, PolicyId, Schema, Token};
use shared_types::errors::StoreError;
use std::sync::Arc;

/// Schema registry; persistence and publication live outside the engine.
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn get_schema_by_iri(
        &self,
        iri: &str,
        topic_id: Option<&str>,
    ) -> Result<Option<Schema>, StoreError>;

    async fn publish(&self, schema_id: &str, version: &str, owner: &str)
        -> Result<Schema, StoreError>;

    async fn increment_version(&self, iri: &str, owner: &str) -> Result<Schema, StoreError>;
}

/// Filter for stored documents; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub policy_id: PolicyId,
    pub schema: Option<String>,
    pub owner: Option<Did>,
    pub tag: Option<String>,
}

impl DocumentQuery {
    #[must_use]
    pub fn matches(&self, document: &PolicyDocument) -> bool {
        document.policy_id == self.policy_id
            && self.schema.as_ref().map_or(true, |s| document.schema.as_ref() == Some(s))
            && self.owner.as_ref().map_or(true, |o| &document.owner == o)
            && self.tag.as_ref().map_or(true, |t| document.tag.as_ref() == Some(t))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace by `id`.
    async fn save(&self, document: PolicyDocument) -> Result<PolicyDocument, StoreError>;

    /// Matching documents, oldest first.
    async fn find(&self, query: &DocumentQuery) -> Result<Vec<PolicyDocument>, StoreError>;
}

/// Issues and checks verifiable credentials.
#[async_trait]
pub trait CredentialService: Send + Sync {
    async fn issue(
        &self,
        issuer: &str,
        signer: &LedgerAccount,
        subject: Value,
    ) -> Result<Value, StoreError>;

    async fn verify(&self, document: &Value) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn ledger_account(&self, did: &str) -> Result<Option<LedgerAccount>, StoreError>;
}

#[async_trait]
pub trait TokenRegistry: Send + Sync {
    async fn get_token(&self, token_id: &str) -> Result<Option<Token>, StoreError>;
}

/// Everything a block handler may call.
#[derive(Clone)]
pub struct EngineServices {
    pub schemas: Arc<dyn SchemaRegistry>,
    pub documents: Arc<dyn DocumentStore>,
    pub credentials: Arc<dyn CredentialService>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub tokens: Arc<dyn TokenRegistry>,
    pub tasks: Arc<dyn TaskSubmitter>,
    pub settlement: Arc<dyn TokenSettlement>,
    pub events: Arc<dyn EventPublisher>,
}
