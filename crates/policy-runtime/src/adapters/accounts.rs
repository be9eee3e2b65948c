//! Ledger accounts and token keys by DID.

use async_trait::async_trait;
use dashmap::DashMap;
use pe_03_mint_orchestrator::{AccountResolver, KeyCustody, KeyType, MintError};
use pe_05_block_tree::AccountDirectory;
use shared_types::entities::LedgerAccount;
use shared_types::errors::StoreError;

/// Serves both the block tree and the mint orchestrator.
#[derive(Default)]
pub struct AccountBook {
    accounts: DashMap<String, LedgerAccount>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, did: impl Into<String>, account: LedgerAccount) {
        self.accounts.insert(did.into(), account);
    }

    fn lookup(&self, did: &str) -> Option<LedgerAccount> {
        self.accounts.get(did).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl AccountDirectory for AccountBook {
    async fn ledger_account(&self, did: &str) -> Result<Option<LedgerAccount>, StoreError> {
        Ok(self.lookup(did))
    }
}

#[async_trait]
impl AccountResolver for AccountBook {
    async fn ledger_account(&self, did: &str) -> Result<Option<LedgerAccount>, MintError> {
        Ok(self.lookup(did))
    }
}

/// Token keys keyed by `(owner, key type, token id)`.
#[derive(Default)]
pub struct InMemoryKeyCustody {
    keys: DashMap<(String, KeyType, String), String>,
}

impl InMemoryKeyCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_key(&self, owner: &str, key_type: KeyType, token_id: &str, key: impl Into<String>) {
        self.keys
            .insert((owner.to_string(), key_type, token_id.to_string()), key.into());
    }
}

#[async_trait]
impl KeyCustody for InMemoryKeyCustody {
    async fn get_key(
        &self,
        owner: &str,
        key_type: KeyType,
        token_id: &str,
    ) -> Result<String, MintError> {
        self.keys
            .get(&(owner.to_string(), key_type, token_id.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                MintError::Custody(format!(
                    "no {} for {owner} on token {token_id}",
                    key_type.as_str()
                ))
            })
    }
}
