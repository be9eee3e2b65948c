//! # Policy Engine
//!
//! Routes broker requests to materialized blocks and events along edges.
//!
//! ## Routing rules
//!
//! - Edges leaving a block are walked in declaration order and delivered
//!   one at a time; the next edge starts only after the previous target
//!   (and everything it triggered) has finished.
//! - The first failing delivery aborts the remaining edges and propagates
//!   to the caller.
//! - Edges whose target the effective user may not access are skipped.
//! - Permission checks on direct calls happen before any side effect.

use crate::blocks::{self, BlockContext};
use crate::domain::errors::{EngineError, TreeError};
use crate::domain::event::{EventActors, PolicyEvent};
use crate::domain::kind::BlockKind;
use crate::domain::options::Behavior;
use crate::domain::permissions::is_allowed;
use crate::domain::tree::BlockTree;
use crate::domain::validation::{check_structure, ValidationReport};
use crate::ports::inbound::BlockRouter;
use crate::ports::outbound::EngineServices;
use crate::registry::{PolicyInstance, PolicyRegistry};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use shared_types::entities::{
    BlockId, DocumentPayload, InputEventType, Policy, PolicyId, PolicyUser,
};
use shared_types::ipc::{ExternalDataPayload, UserRef};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct PolicyEngine {
    registry: Arc<PolicyRegistry>,
    services: EngineServices,
}

impl PolicyEngine {
    pub fn new(registry: Arc<PolicyRegistry>, services: EngineServices) -> Self {
        Self { registry, services }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Materialize `policy` and make it routable, replacing a previous
    /// instance of the same id.
    pub fn load_policy(
        &self,
        policy: &Policy,
        dry_run: bool,
    ) -> Result<Arc<PolicyInstance>, TreeError> {
        let instance = PolicyInstance::materialize(policy, dry_run)?;
        Ok(self.registry.install(instance))
    }

    pub fn unload_policy(&self, policy_id: &str) -> bool {
        let removed = self.registry.remove(policy_id).is_some();
        if removed {
            info!(policy_id, "[pe-05] policy unloaded");
        }
        removed
    }

    /// Deliver `output` of block `source` along its edges.
    ///
    /// Returns the number of deliveries made.
    pub fn trigger_events<'a>(
        &'a self,
        instance: &'a Arc<PolicyInstance>,
        source: usize,
        output: &'a str,
        actors: &'a EventActors,
        data: Option<DocumentPayload>,
    ) -> BoxFuture<'a, Result<usize, EngineError>> {
        async move {
            let tree = &instance.tree;
            let node = tree.node(source);
            let owner = instance.owner_user();
            let mut delivered = 0;

            for edge in tree.edges_from(&node.tag) {
                let config = &edge.config;
                if config.disabled || config.output != output {
                    continue;
                }
                let Some(target) = tree.index_of_tag(&config.target) else {
                    warn!(
                        policy_id = %instance.policy_id,
                        source = %node.tag,
                        target = %config.target,
                        "[pe-05] edge target missing"
                    );
                    continue;
                };
                let actors = actors.resolve(config.actor, &owner);
                if !is_allowed(&tree.node(target).permissions, &actors.user) {
                    debug!(
                        policy_id = %instance.policy_id,
                        target = %config.target,
                        user = %actors.user.did,
                        "[pe-05] edge skipped, target not permitted"
                    );
                    continue;
                }

                let event = PolicyEvent {
                    input: config.input,
                    output: output.to_string(),
                    source_tag: node.tag.clone(),
                    target_tag: config.target.clone(),
                    actors,
                    data: data.clone(),
                };
                self.deliver(instance, target, event).await?;
                delivered += 1;
            }
            Ok(delivered)
        }
        .boxed()
    }

    async fn deliver(
        &self,
        instance: &Arc<PolicyInstance>,
        target: usize,
        event: PolicyEvent,
    ) -> Result<(), EngineError> {
        let ctx = BlockContext {
            engine: self,
            instance,
            index: target,
        };
        if !ctx.node().about().accepts(event.input) {
            debug!(
                target = %event.target_tag,
                input = event.input.as_str(),
                "[pe-05] input not handled by target"
            );
            return Ok(());
        }
        debug!(
            policy_id = %instance.policy_id,
            source = %event.source_tag,
            target = %event.target_tag,
            output = %event.output,
            input = event.input.as_str(),
            "[pe-05] event delivered"
        );

        match event.input {
            InputEventType::RunEvent | InputEventType::TimerEvent | InputEventType::ReleaseEvent => {
                if event.input == InputEventType::RunEvent {
                    blocks::enter_step(&ctx, event.user()).await;
                }
                blocks::run_action(&ctx, event).await
            }
            InputEventType::RefreshEvent => {
                ctx.block_updated(event.user()).await;
                Ok(())
            }
            InputEventType::RestoreEvent => {
                blocks::restore(&ctx, &event);
                Ok(())
            }
            InputEventType::Unknown => Ok(()),
        }
    }

    fn authorize(
        instance: &PolicyInstance,
        index: usize,
        user: &PolicyUser,
    ) -> Result<(), EngineError> {
        let node = instance.tree.node(index);
        if is_allowed(&node.permissions, user) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied {
                user: user.did.clone(),
                block: node.tag.clone(),
            })
        }
    }

    /// Full publish-time validation: structure, then references to schemas
    /// and tokens. Every finding is collected.
    pub async fn validate(&self, policy: &Policy) -> ValidationReport {
        let Some(config) = policy.config.as_ref() else {
            return ValidationReport::failed(TreeError::EmptyPolicy.to_string());
        };
        let tree = match BlockTree::from_config(config) {
            Ok(tree) => tree,
            Err(e) => return ValidationReport::failed(e.to_string()),
        };

        let mut report = ValidationReport::for_tree(&tree);
        check_structure(&tree, &mut report);
        self.check_references(&tree, policy.topic_id.as_deref(), &mut report)
            .await;
        report.finish();

        info!(
            policy_id = %policy.id,
            valid = report.is_valid,
            errors = report.error_count(),
            "[pe-05] policy validated"
        );
        report
    }

    async fn check_references(
        &self,
        tree: &BlockTree,
        topic_id: Option<&str>,
        report: &mut ValidationReport,
    ) {
        for (index, node) in tree.nodes().iter().enumerate() {
            let (schema, token) = match &node.behavior {
                Behavior::RequestVcDocument(opts) => (opts.schema.as_deref(), None),
                Behavior::DocumentsSource(opts) => (opts.schema.as_deref(), None),
                Behavior::ExternalData(opts) => (opts.schema.as_deref(), None),
                Behavior::CalculateContainer(opts) => (opts.output_schema.as_deref(), None),
                Behavior::MintDocument(opts) | Behavior::RetirementDocument(opts) => {
                    (None, opts.token_id.as_deref())
                }
                _ => (None, None),
            };

            if let Some(iri) = schema {
                match self.services.schemas.get_schema_by_iri(iri, topic_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        let message = format!("Schema with id \"{iri}\" does not exist");
                        report.add_block_error(index, message);
                    }
                    Err(e) => report.add_block_error(index, e.to_string()),
                }
            }
            if let Some(token_id) = token {
                match self.services.tokens.get_token(token_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        let message = format!("Token with id {token_id} does not exist");
                        report.add_block_error(index, message);
                    }
                    Err(e) => report.add_block_error(index, e.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl BlockRouter for PolicyEngine {
    async fn get_block_data(
        &self,
        policy_id: &PolicyId,
        block_id: &BlockId,
        user: &UserRef,
    ) -> Result<Value, EngineError> {
        let instance = self.registry.require(policy_id)?;
        let index = instance.node_index(block_id)?;
        let user = instance.resolve_user(&user.did, user.username.as_deref());
        Self::authorize(&instance, index, &user)?;

        let ctx = BlockContext {
            engine: self,
            instance: &instance,
            index,
        };
        blocks::get_data(&ctx, &user).await
    }

    async fn set_block_data(
        &self,
        policy_id: &PolicyId,
        block_id: &BlockId,
        user: &UserRef,
        data: Value,
    ) -> Result<Value, EngineError> {
        let instance = self.registry.require(policy_id)?;
        let index = instance.node_index(block_id)?;
        let user = instance.resolve_user(&user.did, user.username.as_deref());
        Self::authorize(&instance, index, &user)?;

        let ctx = BlockContext {
            engine: self,
            instance: &instance,
            index,
        };
        let result = blocks::set_data(&ctx, &user, data).await;
        if let Err(err) = &result {
            if ctx.node().about().stateful {
                ctx.set_active(&user, true);
            }
            ctx.report_error(&user, &err.to_string()).await;
        }
        result
    }

    fn block_by_tag(&self, policy_id: &PolicyId, tag: &str) -> Result<BlockId, EngineError> {
        let instance = self.registry.require(policy_id)?;
        instance
            .tree
            .by_tag(tag)
            .map(|node| node.id.clone())
            .ok_or_else(|| EngineError::TagNotFound(tag.to_string()))
    }

    fn block_parents(
        &self,
        policy_id: &PolicyId,
        block_id: &BlockId,
    ) -> Result<Vec<BlockId>, EngineError> {
        let instance = self.registry.require(policy_id)?;
        let index = instance.node_index(block_id)?;
        Ok(instance
            .tree
            .parents(index)
            .into_iter()
            .map(|i| instance.tree.node(i).id.clone())
            .collect())
    }

    async fn receive_external_data(
        &self,
        payload: ExternalDataPayload,
    ) -> Result<usize, EngineError> {
        let mut accepted = 0;
        for instance in self.registry.by_policy_tag(&payload.policy_tag) {
            let targets: Vec<usize> = instance
                .tree
                .of_kind(BlockKind::ExternalData)
                .filter(|&i| instance.tree.node(i).tag == payload.block_tag)
                .collect();
            for index in targets {
                let ctx = BlockContext {
                    engine: self,
                    instance: &instance,
                    index,
                };
                if let Err(err) = blocks::receive_external(&ctx, &payload).await {
                    let user = instance.resolve_user(&payload.owner, None);
                    ctx.report_error(&user, &err.to_string()).await;
                    return Err(err);
                }
                accepted += 1;
            }
        }
        debug!(
            policy_tag = %payload.policy_tag,
            block_tag = %payload.block_tag,
            accepted,
            "[pe-05] external data received"
        );
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::{
        AccountDirectory, CredentialService, DocumentQuery, DocumentStore, SchemaRegistry,
        TokenRegistry,
    };
    use parking_lot::Mutex;
    use pe_02_task_dispatcher::{TaskError, TaskRequest, TaskSubmitter};
    use pe_03_mint_orchestrator::{
        LedgerReport, MintContext, MintError, MintReport, MintRequest, TokenSettlement,
        WipeRequest,
    };
    use serde_json::json;
    use shared_bus::{EngineEvent, EventFilter, InMemoryEventBus, Subscription};
    use shared_types::entities::roles::ANY_ROLE;
    use shared_types::entities::{
        BlockDefinition, EventConfig, LedgerAccount, PolicyDocument, Schema, SchemaStatus, Token,
    };
    use shared_types::errors::StoreError;

    struct Schemas;

    #[async_trait]
    impl SchemaRegistry for Schemas {
        async fn get_schema_by_iri(
            &self,
            iri: &str,
            _topic_id: Option<&str>,
        ) -> Result<Option<Schema>, StoreError> {
            Ok((iri == "#reading").then(|| Schema {
                id: "s1".into(),
                iri: iri.into(),
                name: "Reading".into(),
                version: None,
                owner: "did:owner".into(),
                topic_id: None,
                status: SchemaStatus::Published,
                document: json!({"required": ["value"]}),
            }))
        }

        async fn publish(&self, _: &str, _: &str, _: &str) -> Result<Schema, StoreError> {
            Err(StoreError::Backend("read only".into()))
        }

        async fn increment_version(&self, _: &str, _: &str) -> Result<Schema, StoreError> {
            Err(StoreError::Backend("read only".into()))
        }
    }

    #[derive(Default)]
    struct Documents(Mutex<Vec<PolicyDocument>>);

    #[async_trait]
    impl DocumentStore for Documents {
        async fn save(&self, document: PolicyDocument) -> Result<PolicyDocument, StoreError> {
            self.0.lock().push(document.clone());
            Ok(document)
        }

        async fn find(&self, query: &DocumentQuery) -> Result<Vec<PolicyDocument>, StoreError> {
            Ok(self.0.lock().iter().filter(|d| query.matches(d)).cloned().collect())
        }
    }

    struct Credentials;

    #[async_trait]
    impl CredentialService for Credentials {
        async fn issue(
            &self,
            issuer: &str,
            _signer: &LedgerAccount,
            subject: Value,
        ) -> Result<Value, StoreError> {
            Ok(json!({"issuer": issuer, "credentialSubject": [subject]}))
        }

        async fn verify(&self, document: &Value) -> Result<bool, StoreError> {
            Ok(document.get("credentialSubject").is_some())
        }
    }

    struct Accounts;

    #[async_trait]
    impl AccountDirectory for Accounts {
        async fn ledger_account(&self, did: &str) -> Result<Option<LedgerAccount>, StoreError> {
            Ok(Some(LedgerAccount {
                account_id: format!("0.0.{}", did.len()),
                account_key: "key".into(),
            }))
        }
    }

    struct NoTokens;

    #[async_trait]
    impl TokenRegistry for NoTokens {
        async fn get_token(&self, _: &str) -> Result<Option<Token>, StoreError> {
            Ok(None)
        }
    }

    struct NoTasks;

    #[async_trait]
    impl TaskSubmitter for NoTasks {
        async fn submit(&self, _: TaskRequest) -> Result<Value, TaskError> {
            Ok(Value::Null)
        }
    }

    struct NoSettlement;

    #[async_trait]
    impl TokenSettlement for NoSettlement {
        async fn mint(&self, _: &MintContext, _: MintRequest) -> Result<MintReport, MintError> {
            Err(MintError::InvalidAmount("disabled".into()))
        }

        async fn multi_mint(
            &self,
            _: &str,
            _: &LedgerAccount,
            _: &Token,
            _: u64,
            _: &str,
            _: &[String],
        ) -> Result<LedgerReport, MintError> {
            Err(MintError::InvalidAmount("disabled".into()))
        }

        async fn wipe(&self, _: &MintContext, _: WipeRequest) -> Result<(), MintError> {
            Err(MintError::InvalidAmount("disabled".into()))
        }
    }

    struct Fixture {
        engine: PolicyEngine,
        documents: Arc<Documents>,
        events: Subscription,
    }

    fn fixture() -> Fixture {
        let bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe(EventFilter::all());
        let documents = Arc::new(Documents::default());
        let services = EngineServices {
            schemas: Arc::new(Schemas),
            documents: documents.clone(),
            credentials: Arc::new(Credentials),
            accounts: Arc::new(Accounts),
            tokens: Arc::new(NoTokens),
            tasks: Arc::new(NoTasks),
            settlement: Arc::new(NoSettlement),
            events: bus,
        };
        Fixture {
            engine: PolicyEngine::new(Arc::new(PolicyRegistry::new()), services),
            documents,
            events,
        }
    }

    fn button(tag: &str) -> BlockDefinition {
        BlockDefinition::new("buttonBlock", tag)
            .with_permissions(&[ANY_ROLE])
            .with_option("uiMetaData", json!({"buttons": [{"tag": "go"}]}))
    }

    fn container(tag: &str, permissions: &[&str]) -> BlockDefinition {
        BlockDefinition::new("interfaceContainerBlock", tag).with_permissions(permissions)
    }

    fn refresh(source: &str, target: &str) -> EventConfig {
        EventConfig::new(source, target, "go", InputEventType::RefreshEvent)
    }

    fn policy(root: BlockDefinition) -> Policy {
        let mut policy = Policy::draft("p1", "did:owner", "Test");
        policy.policy_tag = "tag-p1".into();
        policy.config = Some(root.to_config().unwrap());
        policy
    }

    fn updated_blocks(events: &mut Subscription) -> Vec<String> {
        let mut ids = Vec::new();
        while let Ok(Some(event)) = events.try_recv() {
            if let EngineEvent::BlockUpdated { block_id, .. } = event {
                ids.push(block_id);
            }
        }
        ids
    }

    fn id_of(engine: &PolicyEngine, tag: &str) -> BlockId {
        engine.block_by_tag(&"p1".to_string(), tag).unwrap()
    }

    fn press() -> Value {
        json!({"tag": "go"})
    }

    #[tokio::test]
    async fn test_fan_out_delivers_in_declaration_order() {
        let mut fx = fixture();
        let root = container("root", &[ANY_ROLE])
            .with_child(
                button("btn")
                    .with_event(refresh("btn", "c2"))
                    .with_event(refresh("btn", "c3"))
                    .with_event(refresh("btn", "c1")),
            )
            .with_child(container("c1", &[ANY_ROLE]))
            .with_child(container("c2", &[ANY_ROLE]))
            .with_child(container("c3", &[ANY_ROLE]));
        fx.engine.load_policy(&policy(root), false).unwrap();

        let btn = id_of(&fx.engine, "btn");
        fx.engine
            .set_block_data(&"p1".into(), &btn, &UserRef::new("did:owner"), press())
            .await
            .unwrap();

        let expected: Vec<String> = ["c2", "c3", "c1"]
            .iter()
            .map(|tag| id_of(&fx.engine, tag).to_string())
            .collect();
        assert_eq!(updated_blocks(&mut fx.events), expected);
    }

    #[tokio::test]
    async fn test_failing_edge_aborts_remaining_edges() {
        let mut fx = fixture();
        let validator = BlockDefinition::new("documentValidatorBlock", "check")
            .with_permissions(&[ANY_ROLE]);
        let root = container("root", &[ANY_ROLE])
            .with_child(
                button("btn")
                    .with_event(refresh("btn", "c1"))
                    .with_event(EventConfig::new("btn", "check", "go", InputEventType::RunEvent))
                    .with_event(refresh("btn", "c2")),
            )
            .with_child(validator)
            .with_child(container("c1", &[ANY_ROLE]))
            .with_child(container("c2", &[ANY_ROLE]));
        fx.engine.load_policy(&policy(root), false).unwrap();

        let btn = id_of(&fx.engine, "btn");
        let err = fx
            .engine
            .set_block_data(&"p1".into(), &btn, &UserRef::new("did:owner"), press())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BlockAction(ref e) if e.message == "Invalid document"));

        let c1 = id_of(&fx.engine, "c1").to_string();
        assert_eq!(updated_blocks(&mut fx.events), vec![c1]);
    }

    #[tokio::test]
    async fn test_unpermitted_targets_are_skipped() {
        let mut fx = fixture();
        let root = container("root", &[ANY_ROLE])
            .with_child(
                button("btn")
                    .with_event(refresh("btn", "c1"))
                    .with_event(refresh("btn", "audit"))
                    .with_event(refresh("btn", "c2")),
            )
            .with_child(container("c1", &[ANY_ROLE]))
            .with_child(container("audit", &["Auditor"]))
            .with_child(container("c2", &[ANY_ROLE]));
        let instance = fx.engine.load_policy(&policy(root), false).unwrap();
        instance.assign_role("did:installer", "Installer");

        let btn = id_of(&fx.engine, "btn");
        let user = UserRef::new("did:installer");
        fx.engine
            .set_block_data(&"p1".into(), &btn, &user, press())
            .await
            .unwrap();

        let expected = vec![
            id_of(&fx.engine, "c1").to_string(),
            id_of(&fx.engine, "c2").to_string(),
        ];
        assert_eq!(updated_blocks(&mut fx.events), expected);

        let audit = id_of(&fx.engine, "audit");
        let err = fx
            .engine
            .get_block_data(&"p1".into(), &audit, &user)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_unpermitted_set_is_rejected_without_side_effects() {
        let mut fx = fixture();
        let request = BlockDefinition::new("requestVcDocumentBlock", "req")
            .with_permissions(&["Installer"])
            .with_option("schema", json!("#reading"))
            .with_event(EventConfig::new("req", "save", "RunEvent", InputEventType::RunEvent));
        let send = BlockDefinition::new("sendToGuardianBlock", "save")
            .with_permissions(&[ANY_ROLE])
            .with_option("options", json!([{"name": "status", "value": "NEW"}]));
        let root = container("root", &[ANY_ROLE]).with_child(request).with_child(send);
        let instance = fx.engine.load_policy(&policy(root), false).unwrap();
        while let Ok(Some(_)) = fx.events.try_recv() {}

        let req = id_of(&fx.engine, "req");
        let err = fx
            .engine
            .set_block_data(
                &"p1".into(),
                &req,
                &UserRef::new("did:guest"),
                json!({"document": {"value": 7}}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied { .. }));

        let mut block_events = Vec::new();
        while let Ok(Some(event)) = fx.events.try_recv() {
            if matches!(
                event,
                EngineEvent::BlockUpdated { .. } | EngineEvent::BlockError { .. }
            ) {
                block_events.push(event);
            }
        }
        assert!(block_events.is_empty());
        assert!(fx.documents.0.lock().is_empty());
        assert!(instance.state.is_empty());
    }

    #[tokio::test]
    async fn test_request_failure_restores_active_flag() {
        let fx = fixture();
        let request = BlockDefinition::new("requestVcDocumentBlock", "req")
            .with_permissions(&[ANY_ROLE])
            .with_option("schema", json!("#reading"))
            .with_event(EventConfig::new("req", "save", "RunEvent", InputEventType::RunEvent));
        let send = BlockDefinition::new("sendToGuardianBlock", "save")
            .with_permissions(&[ANY_ROLE])
            .with_option("options", json!([{"name": "status", "value": "NEW"}]));
        let root = container("root", &[ANY_ROLE]).with_child(request).with_child(send);
        fx.engine.load_policy(&policy(root), false).unwrap();

        let req = id_of(&fx.engine, "req");
        let user = UserRef::new("did:alice");
        let p1: PolicyId = "p1".into();

        let err = fx
            .engine
            .set_block_data(&p1, &req, &user, json!({"document": {"other": 1}}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Field value is required"));
        let data = fx.engine.get_block_data(&p1, &req, &user).await.unwrap();
        assert_eq!(data["active"], json!(true));

        fx.engine
            .set_block_data(&p1, &req, &user, json!({"document": {"value": 7}}))
            .await
            .unwrap();
        let saved = fx.documents.0.lock().clone();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].tag.as_deref(), Some("save"));
        assert_eq!(saved[0].owner, "did:alice");
        assert_eq!(saved[0].option["status"], json!("NEW"));
        assert_eq!(saved[0].credential_subjects()[0]["policyId"], json!("p1"));
    }

    #[tokio::test]
    async fn test_block_parents_and_unknown_tag() {
        let fx = fixture();
        let root = container("root", &[ANY_ROLE])
            .with_child(container("mid", &[ANY_ROLE]).with_child(container("leaf", &[ANY_ROLE])));
        fx.engine.load_policy(&policy(root), false).unwrap();

        let leaf = id_of(&fx.engine, "leaf");
        let parents = fx.engine.block_parents(&"p1".into(), &leaf).unwrap();
        let expected: Vec<BlockId> = ["leaf", "mid", "root"]
            .iter()
            .map(|tag| id_of(&fx.engine, tag))
            .collect();
        assert_eq!(parents, expected);

        assert!(matches!(
            fx.engine.block_by_tag(&"p1".into(), "nope"),
            Err(EngineError::TagNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_reports_missing_references() {
        let fx = fixture();
        let root = container("root", &[ANY_ROLE])
            .with_child(
                BlockDefinition::new("requestVcDocumentBlock", "req")
                    .with_option("schema", json!("#missing")),
            )
            .with_child(
                BlockDefinition::new("mintDocumentBlock", "mint")
                    .with_option("tokenId", json!("0.0.9"))
                    .with_option("rule", json!("value * 2")),
            );
        let report = fx.engine.validate(&policy(root)).await;
        assert!(!report.is_valid);
        let messages: Vec<&String> = report.blocks.iter().flat_map(|b| &b.errors).collect();
        assert!(messages.iter().any(|m| m.contains("#missing")));
        assert!(messages.iter().any(|m| m.contains("0.0.9")));
    }

    #[tokio::test]
    async fn test_external_data_reaches_matching_blocks() {
        let fx = fixture();
        let external = BlockDefinition::new("externalDataBlock", "ext")
            .with_event(EventConfig::new("ext", "save", "RunEvent", InputEventType::RunEvent));
        let send = BlockDefinition::new("sendToGuardianBlock", "save").with_permissions(&[ANY_ROLE]);
        let root = container("root", &[ANY_ROLE]).with_child(external).with_child(send);
        fx.engine.load_policy(&policy(root), false).unwrap();

        let accepted = fx
            .engine
            .receive_external_data(ExternalDataPayload {
                policy_tag: "tag-p1".into(),
                block_tag: "ext".into(),
                owner: "did:sensor".into(),
                document: json!({"credentialSubject": [{"value": 3}]}),
            })
            .await
            .unwrap();
        assert_eq!(accepted, 1);
        assert_eq!(fx.documents.0.lock()[0].owner, "did:sensor");

        let none = fx
            .engine
            .receive_external_data(ExternalDataPayload {
                policy_tag: "other".into(),
                block_tag: "ext".into(),
                owner: "did:sensor".into(),
                document: json!({}),
            })
            .await
            .unwrap();
        assert_eq!(none, 0);
    }
}
