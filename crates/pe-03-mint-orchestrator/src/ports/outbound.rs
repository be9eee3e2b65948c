//! Outbound ports of the mint orchestrator.

use crate::domain::entities::{KeyType, SynchronizationMessage};
use crate::domain::errors::MintError;
use async_trait::async_trait;
use shared_types::entities::{LedgerAccount, MultiPolicyLink, SettlementRecord};

/// Key vault for token owners.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    async fn get_key(&self, owner: &str, key_type: KeyType, token_id: &str)
        -> Result<String, MintError>;
}

/// Federation membership and settlement bookkeeping.
#[async_trait]
pub trait FederationDirectory: Send + Sync {
    async fn get_link(
        &self,
        instance_topic_id: &str,
        user_did: &str,
    ) -> Result<Option<MultiPolicyLink>, MintError>;

    async fn record_settlement(&self, record: SettlementRecord) -> Result<(), MintError>;
}

/// Publishes to a federation synchronization topic.
#[async_trait]
pub trait SynchronizationChannel: Send + Sync {
    async fn send(
        &self,
        topic_id: &str,
        message: &SynchronizationMessage,
        sender: &LedgerAccount,
        dry_run: bool,
    ) -> Result<(), MintError>;
}

#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn ledger_account(&self, did: &str) -> Result<Option<LedgerAccount>, MintError>;
}
