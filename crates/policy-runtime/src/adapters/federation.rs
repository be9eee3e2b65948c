//! Federation links and settlement records.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use pe_03_mint_orchestrator::{FederationDirectory, MintError};
use shared_types::entities::{MultiPolicyLink, SettlementRecord};

#[derive(Default)]
pub struct InMemoryFederation {
    links: DashMap<(String, String), MultiPolicyLink>,
    settlements: RwLock<Vec<SettlementRecord>>,
}

impl InMemoryFederation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(&self, link: MultiPolicyLink) {
        self.links.insert(
            (link.instance_topic_id.clone(), link.user_did.clone()),
            link,
        );
    }

    pub fn settlements(&self) -> Vec<SettlementRecord> {
        self.settlements.read().clone()
    }
}

#[async_trait]
impl FederationDirectory for InMemoryFederation {
    async fn get_link(
        &self,
        instance_topic_id: &str,
        user_did: &str,
    ) -> Result<Option<MultiPolicyLink>, MintError> {
        Ok(self
            .links
            .get(&(instance_topic_id.to_string(), user_did.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn record_settlement(&self, record: SettlementRecord) -> Result<(), MintError> {
        self.settlements.write().push(record);
        Ok(())
    }
}
