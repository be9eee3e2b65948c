//! Settlement decorator that records chunk outcomes.

use async_trait::async_trait;
use pe_03_mint_orchestrator::{
    LedgerReport, MintContext, MintError, MintReport, MintRequest, TokenSettlement, WipeRequest,
};
use policy_telemetry::metrics::FEDERATED_MINTS;
use policy_telemetry::record_mint_chunks;
use shared_types::entities::{LedgerAccount, Token};
use std::sync::Arc;

pub struct MeteredSettlement {
    inner: Arc<dyn TokenSettlement>,
}

impl MeteredSettlement {
    pub fn new(inner: Arc<dyn TokenSettlement>) -> Self {
        Self { inner }
    }
}

fn record(report: &LedgerReport) {
    record_mint_chunks(
        "mint",
        report.mint_chunks.saturating_sub(report.failed_mint_chunks),
        report.failed_mint_chunks,
    );
    record_mint_chunks(
        "transfer",
        report.transfer_chunks.saturating_sub(report.failed_transfer_chunks),
        report.failed_transfer_chunks,
    );
}

#[async_trait]
impl TokenSettlement for MeteredSettlement {
    async fn mint(&self, ctx: &MintContext, request: MintRequest) -> Result<MintReport, MintError> {
        let report = self.inner.mint(ctx, request).await?;
        match &report {
            MintReport::Ledger(ledger) => record(ledger),
            MintReport::Federated { .. } => FEDERATED_MINTS.inc(),
        }
        Ok(report)
    }

    async fn multi_mint(
        &self,
        policy_id: &str,
        root: &LedgerAccount,
        token: &Token,
        amount: u64,
        target_account: &str,
        ids: &[String],
    ) -> Result<LedgerReport, MintError> {
        let report = self
            .inner
            .multi_mint(policy_id, root, token, amount, target_account, ids)
            .await?;
        record(&report);
        Ok(report)
    }

    async fn wipe(&self, ctx: &MintContext, request: WipeRequest) -> Result<(), MintError> {
        self.inner.wipe(ctx, request).await
    }
}
