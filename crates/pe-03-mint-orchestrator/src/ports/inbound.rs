//! Inbound port: what the block tree calls to settle tokens.

use crate::domain::entities::{LedgerReport, MintContext, MintReport, MintRequest, WipeRequest};
use crate::domain::errors::MintError;
use async_trait::async_trait;
use shared_types::entities::{LedgerAccount, Token};

#[async_trait]
pub trait TokenSettlement: Send + Sync {
    /// Mint for one credential set, through the ledger or the federation.
    async fn mint(&self, ctx: &MintContext, request: MintRequest) -> Result<MintReport, MintError>;

    /// Mint on behalf of settled federation requests. The memo joins `ids`.
    async fn multi_mint(
        &self,
        policy_id: &str,
        root: &LedgerAccount,
        token: &Token,
        amount: u64,
        target_account: &str,
        ids: &[String],
    ) -> Result<LedgerReport, MintError>;

    /// Wipe tokens; any failure is returned to the caller.
    async fn wipe(&self, ctx: &MintContext, request: WipeRequest) -> Result<(), MintError>;
}
