//! # Service Container
//!
//! Builds every subsystem against the in-memory adapters, in dependency
//! order:
//!
//! ```text
//! 1. Event bus
//! 2. Task dispatcher (pe-02)        → bus
//! 3. Accounts, custody, federation
//! 4. Mint orchestrator (pe-03)      → dispatcher, bus
//! 5. Stores, credentials, engine (pe-05)
//! 6. Version converter (pe-01), lifecycle, request handler
//! ```
//!
//! Background loops are not started here; see [`crate::PolicyRuntime`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use pe_01_version_converter::PolicyConverter;
use pe_02_task_dispatcher::{BusTaskChannel, TaskDispatcher};
use pe_03_mint_orchestrator::{BusSynchronizationChannel, MintOrchestrator};
use pe_05_block_tree::{EngineServices, PolicyEngine, PolicyRegistry};
use shared_bus::InMemoryEventBus;

use crate::adapters::{
    AccountBook, DigestCredentialService, InMemoryDocumentStore, InMemoryFederation,
    InMemoryKeyCustody, InMemoryPolicyRepository, InMemorySchemaRegistry, InMemoryTokenRegistry,
    MeteredSettlement,
};
use crate::container::config::EngineConfig;
use crate::handlers::{PolicyLifecycle, RequestHandler};

pub struct ServiceContainer {
    pub config: EngineConfig,
    pub bus: Arc<InMemoryEventBus>,
    pub dispatcher: Arc<TaskDispatcher>,

    pub accounts: Arc<AccountBook>,
    pub custody: Arc<InMemoryKeyCustody>,
    pub federation: Arc<InMemoryFederation>,

    pub schemas: Arc<InMemorySchemaRegistry>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub tokens: Arc<InMemoryTokenRegistry>,
    pub policies: Arc<InMemoryPolicyRepository>,

    pub engine: Arc<PolicyEngine>,
    pub lifecycle: Arc<PolicyLifecycle>,
    pub handler: Arc<RequestHandler>,
}

impl ServiceContainer {
    pub fn new(config: EngineConfig) -> Result<Self> {
        info!("[runtime] building service container");

        let bus = Arc::new(InMemoryEventBus::with_capacity(config.broker.bus_capacity));

        let dispatcher = Arc::new(TaskDispatcher::new(
            Arc::new(BusTaskChannel::new(bus.clone())),
            config.dispatcher.to_dispatcher_config(),
        ));
        info!(
            max_attempts = config.dispatcher.max_task_attempts,
            timeout_secs = config.dispatcher.task_timeout_secs,
            "[runtime] task dispatcher ready"
        );

        let accounts = Arc::new(AccountBook::new());
        let custody = Arc::new(InMemoryKeyCustody::new());
        let federation = Arc::new(InMemoryFederation::new());

        let orchestrator = MintOrchestrator::new(
            dispatcher.clone(),
            custody.clone(),
            federation.clone(),
            Arc::new(BusSynchronizationChannel::new(bus.clone())),
            accounts.clone(),
            bus.clone(),
        )
        .with_config(config.mint.to_mint_config());
        let settlement = Arc::new(MeteredSettlement::new(Arc::new(orchestrator)));
        info!(chunk_size = config.mint.chunk_size, "[runtime] mint orchestrator ready");

        let schemas = Arc::new(InMemorySchemaRegistry::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let tokens = Arc::new(InMemoryTokenRegistry::new());
        let policies = Arc::new(InMemoryPolicyRepository::new());

        let services = EngineServices {
            schemas: schemas.clone(),
            documents: documents.clone(),
            credentials: Arc::new(DigestCredentialService::new()),
            accounts: accounts.clone(),
            tokens: tokens.clone(),
            tasks: dispatcher.clone(),
            settlement,
            events: bus.clone(),
        };
        let engine = Arc::new(PolicyEngine::new(Arc::new(PolicyRegistry::new()), services));

        let converter = PolicyConverter::new().context("failed to build policy converter")?;
        let lifecycle = Arc::new(PolicyLifecycle::new(
            policies.clone(),
            schemas.clone(),
            Arc::new(converter),
            engine.clone(),
            config.runtime.dry_run,
        ));
        let handler = Arc::new(RequestHandler::new(engine.clone(), lifecycle.clone()));
        info!(dry_run = config.runtime.dry_run, "[runtime] policy engine ready");

        Ok(Self {
            config,
            bus,
            dispatcher,
            accounts,
            custody,
            federation,
            schemas,
            documents,
            tokens,
            policies,
            engine,
            lifecycle,
            handler,
        })
    }
}
