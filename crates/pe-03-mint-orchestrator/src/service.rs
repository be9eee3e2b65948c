//! # Mint Orchestrator Service
//!
//! Ledger and federation settlement for the mint block.

use crate::domain::entities::{
    KeyType, LedgerReport, MintConfig, MintContext, MintReport, MintRequest,
    SynchronizationMessage, TokenConfig, WipeRequest,
};
use crate::domain::errors::{LedgerError, MintError};
use crate::domain::hash::credential_hash;
use crate::domain::scatter::{chunk_sizes, scatter_gather, split_chunks};
use crate::ports::inbound::TokenSettlement;
use crate::ports::outbound::{AccountResolver, FederationDirectory, KeyCustody, SynchronizationChannel};
use async_trait::async_trait;
use chrono::Utc;
use pe_02_task_dispatcher::{TaskRequest, TaskSubmitter};
use serde_json::{json, Value};
use shared_bus::{EngineEvent, EventPublisher};
use shared_types::entities::{
    FederationRole, LedgerAccount, MultiPolicyLink, SettlementRecord, SettlementStatus, Token,
    TokenType,
};
use shared_types::ipc::WorkerTaskType;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything a ledger run needs besides the token configuration.
struct LedgerRun<'a> {
    root: &'a LedgerAccount,
    token: &'a Token,
    amount: u64,
    target_account: &'a str,
    correlation_id: &'a str,
    memo: &'a str,
    dry_run: bool,
}

pub struct MintOrchestrator {
    tasks: Arc<dyn TaskSubmitter>,
    custody: Arc<dyn KeyCustody>,
    federation: Arc<dyn FederationDirectory>,
    sync: Arc<dyn SynchronizationChannel>,
    accounts: Arc<dyn AccountResolver>,
    events: Arc<dyn EventPublisher>,
    config: MintConfig,
}

impl MintOrchestrator {
    pub fn new(
        tasks: Arc<dyn TaskSubmitter>,
        custody: Arc<dyn KeyCustody>,
        federation: Arc<dyn FederationDirectory>,
        sync: Arc<dyn SynchronizationChannel>,
        accounts: Arc<dyn AccountResolver>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            tasks,
            custody,
            federation,
            sync,
            accounts,
            events,
            config: MintConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: MintConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> MintConfig {
        self.config
    }

    /// Treasury and supply credentials. Dry runs use throwaway keys.
    async fn token_config(&self, token: &Token, dry_run: bool) -> Result<TokenConfig, MintError> {
        let treasury = self
            .accounts
            .ledger_account(&token.owner)
            .await?
            .ok_or_else(|| MintError::AccountNotFound(token.owner.clone()))?;
        let (treasury_key, supply_key) = if dry_run {
            (random_key(), random_key())
        } else {
            (
                self.custody
                    .get_key(&token.owner, KeyType::TokenTreasuryKey, &token.token_id)
                    .await?,
                self.custody
                    .get_key(&token.owner, KeyType::TokenSupplyKey, &token.token_id)
                    .await?,
            )
        };
        Ok(TokenConfig {
            token_id: token.token_id.clone(),
            treasury_id: treasury.account_id,
            treasury_key,
            supply_key,
        })
    }

    fn request(&self, task_type: WorkerTaskType, data: Value) -> TaskRequest {
        TaskRequest::retryable(task_type, data, self.config.priority, self.config.attempts)
    }

    async fn run_ledger(&self, run: LedgerRun<'_>) -> Result<LedgerReport, MintError> {
        let token_config = self.token_config(run.token, run.dry_run).await?;
        let report = match run.token.token_type {
            TokenType::NonFungible => self.mint_non_fungible(&token_config, &run).await,
            TokenType::Fungible => self.mint_fungible(&token_config, &run).await,
        };
        info!(
            "[pe-03] Mint {} of {} ({:?}): minted {}/{}, transferred {}",
            report.mint_id,
            run.token.token_id,
            run.token.token_type,
            report.minted,
            report.requested,
            report.transferred
        );
        Ok(report)
    }

    async fn mint_non_fungible(&self, config: &TokenConfig, run: &LedgerRun<'_>) -> LedgerReport {
        let mut report = LedgerReport {
            mint_id: mint_id(),
            requested: run.amount,
            ..LedgerReport::default()
        };
        let chunks = chunk_sizes(run.amount, self.config.chunk_size);
        report.mint_chunks = chunks.len();
        debug!(
            "[pe-03] Mint {}: {} serials in {} chunks",
            report.mint_id,
            run.amount,
            chunks.len()
        );

        let minted = scatter_gather(chunks, |index, size| {
            let chunk = vec![run.correlation_id; size];
            let data = json!({
                "accountId": run.root.account_id,
                "accountKey": run.root.account_key,
                "dryRun": run.dry_run,
                "tokenId": config.token_id,
                "supplyKey": config.supply_key,
                "metaData": chunk,
                "transactionMemo": run.memo,
            });
            self.submit(WorkerTaskType::MintNft, Some(index), data)
        })
        .await;

        report.failed_mint_chunks = minted.failures.len();
        for (index, err) in &minted.failures {
            warn!("[pe-03] Mint {}: chunk {} failed: {}", report.mint_id, index, err);
        }
        report.serials = minted.into_values().flat_map(|value| serials(&value)).collect();
        report.minted = report.serials.len() as u64;

        let transfers = split_chunks(&report.serials, self.config.chunk_size);
        report.transfer_chunks = transfers.len();
        let transferred = scatter_gather(transfers, |index, chunk| {
            let count = chunk.len() as u64;
            let data = json!({
                "accountId": run.root.account_id,
                "accountKey": run.root.account_key,
                "dryRun": run.dry_run,
                "tokenId": config.token_id,
                "targetAccount": run.target_account,
                "treasuryId": config.treasury_id,
                "treasuryKey": config.treasury_key,
                "serials": chunk,
                "transactionMemo": run.memo,
            });
            let fut = self.submit(WorkerTaskType::TransferNft, Some(index), data);
            async move { fut.await.map(|_| count) }
        })
        .await;

        report.failed_transfer_chunks = transferred.failures.len();
        for (index, err) in &transferred.failures {
            warn!("[pe-03] Mint {}: transfer chunk {} failed: {}", report.mint_id, index, err);
        }
        report.transferred = transferred.into_values().sum();
        report
    }

    async fn mint_fungible(&self, config: &TokenConfig, run: &LedgerRun<'_>) -> LedgerReport {
        let mut report = LedgerReport {
            mint_id: mint_id(),
            requested: run.amount,
            ..LedgerReport::default()
        };
        let mint = json!({
            "accountId": run.root.account_id,
            "accountKey": run.root.account_key,
            "dryRun": run.dry_run,
            "tokenId": config.token_id,
            "supplyKey": config.supply_key,
            "tokenValue": run.amount,
            "transactionMemo": run.memo,
        });
        report.mint_chunks = 1;
        if let Err(err) = self.submit(WorkerTaskType::MintFt, None, mint).await {
            report.failed_mint_chunks = 1;
            warn!("[pe-03] Mint {}: {}", report.mint_id, err);
            return report;
        }
        report.minted = run.amount;

        let transfer = json!({
            "accountId": run.root.account_id,
            "accountKey": run.root.account_key,
            "dryRun": run.dry_run,
            "tokenId": config.token_id,
            "targetAccount": run.target_account,
            "treasuryId": config.treasury_id,
            "treasuryKey": config.treasury_key,
            "tokenValue": run.amount,
            "transactionMemo": run.memo,
        });
        report.transfer_chunks = 1;
        match self.submit(WorkerTaskType::TransferFt, None, transfer).await {
            Ok(_) => report.transferred = run.amount,
            Err(err) => {
                report.failed_transfer_chunks = 1;
                warn!("[pe-03] Mint {}: {}", report.mint_id, err);
            }
        }
        report
    }

    async fn publish_minted(
        &self,
        policy_id: &str,
        token: &Token,
        amount: u64,
        memo: String,
        target: String,
    ) {
        self.events
            .publish(EngineEvent::TokenMinted {
                policy_id: policy_id.to_string(),
                token_id: token.token_id.clone(),
                amount,
                memo,
                target,
            })
            .await;
    }

    /// Amounts the ledger cannot take are refused before any task is built.
    fn check_amount(&self, token: &Token, amount: u64) -> Result<(), MintError> {
        if amount == 0 {
            return Err(MintError::InvalidAmount("amount must be positive".into()));
        }
        let ceiling = match token.token_type {
            TokenType::NonFungible => self.config.max_nft_amount,
            TokenType::Fungible => crate::MAX_FT_AMOUNT,
        };
        if amount > ceiling {
            return Err(MintError::InvalidAmount(format!(
                "{amount} exceeds the limit of {ceiling} for {}",
                token.token_id
            )));
        }
        Ok(())
    }

    async fn submit(
        &self,
        task_type: WorkerTaskType,
        chunk: Option<usize>,
        data: Value,
    ) -> Result<Value, LedgerError> {
        self.tasks
            .submit(self.request(task_type, data))
            .await
            .map_err(|source| LedgerError {
                task_type,
                chunk,
                source,
            })
    }

    async fn settle_federated(
        &self,
        ctx: &MintContext,
        link: MultiPolicyLink,
        request: &MintRequest,
    ) -> Result<MintReport, MintError> {
        let hash = credential_hash(&request.documents);
        let message = SynchronizationMessage {
            hash: hash.clone(),
            message_id: request.correlation_id.clone(),
            token_id: request.token.token_id.clone(),
            amount: request.amount,
            memo: request.memo.clone(),
            target: request.target_account.clone(),
        };
        self.sync
            .send(&link.synchronization_topic_id, &message, &request.root, ctx.dry_run)
            .await?;

        let mut settlement_recorded = false;
        if link.role == FederationRole::Main {
            let account = self
                .accounts
                .ledger_account(&request.owner)
                .await?
                .ok_or_else(|| MintError::AccountNotFound(request.owner.clone()))?;
            self.federation
                .record_settlement(SettlementRecord {
                    id: Uuid::new_v4().to_string(),
                    policy_id: ctx.policy_id.clone(),
                    owner: request.owner.clone(),
                    account_id: account.account_id,
                    hash: hash.clone(),
                    token_id: request.token.token_id.clone(),
                    amount: request.amount,
                    target: request.target_account.clone(),
                    status: SettlementStatus::Waiting,
                    created_at: Utc::now(),
                })
                .await?;
            settlement_recorded = true;
        }

        info!(
            "[pe-03] Federated mint {} sent to {} (main={})",
            message.message_id, link.synchronization_topic_id, settlement_recorded
        );
        Ok(MintReport::Federated {
            hash,
            settlement_recorded,
        })
    }
}

#[async_trait]
impl TokenSettlement for MintOrchestrator {
    async fn mint(&self, ctx: &MintContext, request: MintRequest) -> Result<MintReport, MintError> {
        self.check_amount(&request.token, request.amount)?;

        if let Some(topic) = ctx.instance_topic_id.as_deref() {
            if let Some(link) = self.federation.get_link(topic, &request.owner).await? {
                let report = self.settle_federated(ctx, link, &request).await?;
                self.publish_minted(
                    &ctx.policy_id,
                    &request.token,
                    request.amount,
                    request.memo,
                    request.target_account,
                )
                .await;
                return Ok(report);
            }
        }

        let report = self
            .run_ledger(LedgerRun {
                root: &request.root,
                token: &request.token,
                amount: request.amount,
                target_account: &request.target_account,
                correlation_id: &request.correlation_id,
                memo: &request.memo,
                dry_run: ctx.dry_run,
            })
            .await?;

        self.publish_minted(
            &ctx.policy_id,
            &request.token,
            report.transferred,
            request.memo,
            request.target_account,
        )
        .await;
        Ok(MintReport::Ledger(report))
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
        self.check_amount(token, amount)?;
        let memo = ids.join(",");
        let correlation_id = Uuid::new_v4().to_string();
        let report = self
            .run_ledger(LedgerRun {
                root,
                token,
                amount,
                target_account,
                correlation_id: &correlation_id,
                memo: &memo,
                dry_run: false,
            })
            .await?;
        self.publish_minted(
            policy_id,
            token,
            report.transferred,
            memo,
            target_account.to_string(),
        )
        .await;
        Ok(report)
    }

    async fn wipe(&self, ctx: &MintContext, request: WipeRequest) -> Result<(), MintError> {
        let wipe_key = if ctx.dry_run {
            random_key()
        } else {
            self.custody
                .get_key(&request.token.owner, KeyType::TokenWipeKey, &request.token.token_id)
                .await?
        };
        let data = json!({
            "accountId": request.root.account_id,
            "accountKey": request.root.account_key,
            "dryRun": ctx.dry_run,
            "tokenId": request.token.token_id,
            "wipeKey": wipe_key,
            "targetAccount": request.target_account,
            "tokenValue": request.amount,
            "uuid": request.correlation_id,
        });
        self.submit(WorkerTaskType::WipeToken, None, data).await?;
        info!(
            "[pe-03] Wiped {} of {} from {}",
            request.amount, request.token.token_id, request.target_account
        );
        Ok(())
    }
}

fn mint_id() -> String {
    Utc::now().timestamp_millis().to_string()
}

fn random_key() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

/// Serial numbers from a `MINT_NFT` result.
fn serials(value: &Value) -> Vec<u64> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_u64).collect(),
        Value::Object(map) => map.get("serials").map(serials).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pe_02_task_dispatcher::TaskError;
    use parking_lot::Mutex;
    use shared_bus::{EventFilter, EventTopic, InMemoryEventBus};
    use shared_types::ipc::TaskId;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Answers ledger tasks in-process and fails the listed call numbers.
    struct ScriptedLedger {
        calls: Mutex<Vec<TaskRequest>>,
        next_serial: AtomicU64,
        fail_calls: Vec<usize>,
    }

    impl ScriptedLedger {
        fn new(fail_calls: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                next_serial: AtomicU64::new(1),
                fail_calls,
            })
        }

        fn of_type(&self, task_type: WorkerTaskType) -> Vec<TaskRequest> {
            self.calls
                .lock()
                .iter()
                .filter(|r| r.task_type == task_type)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl TaskSubmitter for ScriptedLedger {
        async fn submit(&self, request: TaskRequest) -> Result<Value, TaskError> {
            let call = {
                let mut calls = self.calls.lock();
                calls.push(request.clone());
                calls.len()
            };
            if self.fail_calls.contains(&call) {
                return Err(TaskError::Failed {
                    task_id: TaskId::new(),
                    task_type: request.task_type,
                    attempts: 1,
                    message: "ledger unavailable".into(),
                });
            }
            match request.task_type {
                WorkerTaskType::MintNft => {
                    let count = request.data["metaData"].as_array().map_or(0, Vec::len) as u64;
                    let start = self.next_serial.fetch_add(count, Ordering::SeqCst);
                    Ok(json!((start..start + count).collect::<Vec<u64>>()))
                }
                _ => Ok(json!(true)),
            }
        }
    }

    struct FixedCustody;

    #[async_trait]
    impl KeyCustody for FixedCustody {
        async fn get_key(
            &self,
            owner: &str,
            key_type: KeyType,
            token_id: &str,
        ) -> Result<String, MintError> {
            Ok(format!("{owner}:{key_type}:{token_id}"))
        }
    }

    #[derive(Default)]
    struct Federation {
        link: Option<MultiPolicyLink>,
        settlements: Mutex<Vec<SettlementRecord>>,
    }

    #[async_trait]
    impl FederationDirectory for Federation {
        async fn get_link(
            &self,
            _instance_topic_id: &str,
            _user_did: &str,
        ) -> Result<Option<MultiPolicyLink>, MintError> {
            Ok(self.link.clone())
        }

        async fn record_settlement(&self, record: SettlementRecord) -> Result<(), MintError> {
            self.settlements.lock().push(record);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<(String, SynchronizationMessage)>>);

    #[async_trait]
    impl SynchronizationChannel for Outbox {
        async fn send(
            &self,
            topic_id: &str,
            message: &SynchronizationMessage,
            _sender: &LedgerAccount,
            _dry_run: bool,
        ) -> Result<(), MintError> {
            self.0.lock().push((topic_id.to_string(), message.clone()));
            Ok(())
        }
    }

    struct Accounts;

    #[async_trait]
    impl AccountResolver for Accounts {
        async fn ledger_account(&self, did: &str) -> Result<Option<LedgerAccount>, MintError> {
            Ok(Some(LedgerAccount {
                account_id: format!("acct-{did}"),
                account_key: "k".into(),
            }))
        }
    }

    struct Harness {
        ledger: Arc<ScriptedLedger>,
        federation: Arc<Federation>,
        outbox: Arc<Outbox>,
        bus: Arc<InMemoryEventBus>,
        orchestrator: MintOrchestrator,
    }

    fn harness(fail_calls: Vec<usize>, link: Option<MultiPolicyLink>) -> Harness {
        let ledger = ScriptedLedger::new(fail_calls);
        let federation = Arc::new(Federation {
            link,
            ..Federation::default()
        });
        let outbox = Arc::new(Outbox::default());
        let bus = Arc::new(InMemoryEventBus::new());
        let orchestrator = MintOrchestrator::new(
            ledger.clone(),
            Arc::new(FixedCustody),
            federation.clone(),
            outbox.clone(),
            Arc::new(Accounts),
            bus.clone(),
        );
        Harness {
            ledger,
            federation,
            outbox,
            bus,
            orchestrator,
        }
    }

    fn token(token_type: TokenType) -> Token {
        Token {
            token_id: "0.0.500".into(),
            token_name: "Carbon".into(),
            token_type,
            decimals: 0,
            owner: "did:standard-registry".into(),
            enable_wipe: true,
        }
    }

    fn request(token_type: TokenType, amount: u64) -> MintRequest {
        MintRequest {
            token: token(token_type),
            amount,
            owner: "did:user".into(),
            root: LedgerAccount {
                account_id: "0.0.2".into(),
                account_key: "root-key".into(),
            },
            target_account: "0.0.77".into(),
            correlation_id: "vc-1".into(),
            memo: "memo".into(),
            documents: vec![json!({"credentialSubject": [{"amount": amount}]})],
        }
    }

    fn ctx() -> MintContext {
        MintContext {
            policy_id: "policy-1".into(),
            instance_topic_id: Some("0.0.100".into()),
            block_tag: Some("mint".into()),
            dry_run: false,
        }
    }

    fn ledger_report(report: MintReport) -> LedgerReport {
        match report {
            MintReport::Ledger(report) => report,
            other => panic!("expected ledger report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_nft_mint_chunks_by_ten() {
        let h = harness(vec![], None);
        let report = ledger_report(
            h.orchestrator
                .mint(&ctx(), request(TokenType::NonFungible, 25))
                .await
                .unwrap(),
        );

        let sizes: Vec<usize> = h
            .ledger
            .of_type(WorkerTaskType::MintNft)
            .iter()
            .map(|r| r.data["metaData"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(report.minted, 25);
        assert_eq!(report.transferred, 25);
        assert!(report.is_complete());
        assert_eq!(h.ledger.of_type(WorkerTaskType::TransferNft).len(), 3);
    }

    #[tokio::test]
    async fn test_failed_mint_chunk_is_isolated() {
        // Call 2 is the second MINT_NFT chunk.
        let h = harness(vec![2], None);
        let report = ledger_report(
            h.orchestrator
                .mint(&ctx(), request(TokenType::NonFungible, 25))
                .await
                .unwrap(),
        );

        assert_eq!(report.failed_mint_chunks, 1);
        assert_eq!(report.minted, 15);
        let transferred: usize = h
            .ledger
            .of_type(WorkerTaskType::TransferNft)
            .iter()
            .map(|r| r.data["serials"].as_array().unwrap().len())
            .sum();
        assert_eq!(transferred, 15);
        assert_eq!(report.transferred, 15);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_mint_tasks_carry_custody_keys() {
        let h = harness(vec![], None);
        h.orchestrator
            .mint(&ctx(), request(TokenType::NonFungible, 1))
            .await
            .unwrap();

        let mint = &h.ledger.of_type(WorkerTaskType::MintNft)[0];
        assert!(mint.retryable);
        assert_eq!(mint.priority, 1);
        assert_eq!(
            mint.data["supplyKey"],
            json!("did:standard-registry:TOKEN_SUPPLY_KEY:0.0.500")
        );
        assert_eq!(mint.data["metaData"], json!(["vc-1"]));
    }

    #[tokio::test]
    async fn test_fungible_mint_then_transfer() {
        let h = harness(vec![], None);
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::External]));
        let report = ledger_report(
            h.orchestrator
                .mint(&ctx(), request(TokenType::Fungible, 300))
                .await
                .unwrap(),
        );

        let calls = h.ledger.calls.lock().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].task_type, WorkerTaskType::MintFt);
        assert_eq!(calls[1].task_type, WorkerTaskType::TransferFt);
        assert_eq!(calls[1].data["tokenValue"], json!(300));
        assert_eq!(report.transferred, 300);

        match sub.recv().await {
            Some(EngineEvent::TokenMinted { amount, token_id, .. }) => {
                assert_eq!(amount, 300);
                assert_eq!(token_id, "0.0.500");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fungible_mint_failure_skips_transfer() {
        let h = harness(vec![1], None);
        let report = ledger_report(
            h.orchestrator
                .mint(&ctx(), request(TokenType::Fungible, 300))
                .await
                .unwrap(),
        );
        assert_eq!(report.failed_mint_chunks, 1);
        assert_eq!(report.transferred, 0);
        assert!(h.ledger.of_type(WorkerTaskType::TransferFt).is_empty());
    }

    #[tokio::test]
    async fn test_federated_main_records_settlement() {
        let link = MultiPolicyLink {
            instance_topic_id: "0.0.100".into(),
            user_did: "did:user".into(),
            role: FederationRole::Main,
            synchronization_topic_id: "0.0.900".into(),
        };
        let h = harness(vec![], Some(link));
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::External]));
        let report = h
            .orchestrator
            .mint(&ctx(), request(TokenType::NonFungible, 4))
            .await
            .unwrap();

        assert!(matches!(
            report,
            MintReport::Federated {
                settlement_recorded: true,
                ..
            }
        ));
        assert!(h.ledger.calls.lock().is_empty());
        let sent = h.outbox.0.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "0.0.900");
        assert_eq!(sent[0].1.message_id, "vc-1");
        let settlements = h.federation.settlements.lock();
        assert_eq!(settlements[0].status, SettlementStatus::Waiting);
        assert_eq!(settlements[0].account_id, "acct-did:user");
        assert_eq!(settlements[0].hash, sent[0].1.hash);

        match sub.recv().await {
            Some(EngineEvent::TokenMinted { amount, target, .. }) => {
                assert_eq!(amount, 4);
                assert_eq!(target, "0.0.77");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_federated_member_only_sends() {
        let link = MultiPolicyLink {
            instance_topic_id: "0.0.100".into(),
            user_did: "did:user".into(),
            role: FederationRole::Member,
            synchronization_topic_id: "0.0.900".into(),
        };
        let h = harness(vec![], Some(link));
        h.orchestrator
            .mint(&ctx(), request(TokenType::NonFungible, 4))
            .await
            .unwrap();
        assert_eq!(h.outbox.0.lock().len(), 1);
        assert!(h.federation.settlements.lock().is_empty());
    }

    #[tokio::test]
    async fn test_multi_mint_joins_ids_into_memo() {
        let h = harness(vec![], None);
        let root = LedgerAccount {
            account_id: "0.0.2".into(),
            account_key: "k".into(),
        };
        let ids = vec!["a".to_string(), "b".to_string()];
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::External]));
        h.orchestrator
            .multi_mint("policy-1", &root, &token(TokenType::Fungible), 10, "0.0.77", &ids)
            .await
            .unwrap();
        assert_eq!(
            h.ledger.calls.lock()[0].data["transactionMemo"],
            json!("a,b")
        );

        match sub.recv().await {
            Some(EngineEvent::TokenMinted {
                policy_id, memo, amount, ..
            }) => {
                assert_eq!(policy_id, "policy-1");
                assert_eq!(memo, "a,b");
                assert_eq!(amount, 10);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_wipe_failure_is_returned() {
        let h = harness(vec![1], None);
        let wipe = WipeRequest {
            token: token(TokenType::Fungible),
            amount: 5,
            root: LedgerAccount {
                account_id: "0.0.2".into(),
                account_key: "k".into(),
            },
            target_account: "0.0.77".into(),
            correlation_id: "vc-1".into(),
        };
        let err = h.orchestrator.wipe(&ctx(), wipe).await.unwrap_err();
        assert!(matches!(err, MintError::Ledger(ref e) if e.task_type == WorkerTaskType::WipeToken));
    }

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let h = harness(vec![], None);
        let err = h
            .orchestrator
            .mint(&ctx(), request(TokenType::NonFungible, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_oversized_nft_amount_rejected_before_ledger() {
        let h = harness(vec![], None);
        let err = h
            .orchestrator
            .mint(&ctx(), request(TokenType::NonFungible, 1u64 << 60))
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::InvalidAmount(_)));
        assert!(h.ledger.calls.lock().is_empty());

        let err = h
            .orchestrator
            .mint(&ctx(), request(TokenType::Fungible, u64::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_nft_ceiling_is_configurable() {
        let h = harness(vec![], None);
        let orchestrator = h.orchestrator.with_config(MintConfig {
            max_nft_amount: 25,
            ..MintConfig::default()
        });

        let report = ledger_report(
            orchestrator
                .mint(&ctx(), request(TokenType::NonFungible, 25))
                .await
                .unwrap(),
        );
        assert_eq!(report.mint_chunks, 3);
        assert_eq!(report.minted, 25);

        let err = orchestrator
            .mint(&ctx(), request(TokenType::NonFungible, 26))
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::InvalidAmount(_)));
    }
}
