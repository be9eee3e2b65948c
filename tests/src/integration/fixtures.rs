//! Shared setup for the integration flows.

use policy_runtime::{BrokerHandle, EngineConfig, PolicyRuntime, ServiceContainer};
use serde_json::{json, Value};
use shared_types::entities::output_events::RUN_EVENT;
use shared_types::entities::roles::ANY_ROLE;
use shared_types::entities::{
    BlockDefinition, EventConfig, InputEventType, LedgerAccount, Policy, Schema, SchemaStatus,
    Token, TokenType,
};
use shared_types::ipc::{EngineRequest, EngineResponse};

pub const OWNER: &str = "did:example:registry";
pub const INSTALLER: &str = "did:example:installer";
pub const OWNER_ACCOUNT: &str = "0.0.1001";
pub const INSTALLER_ACCOUNT: &str = "0.0.1002";
pub const TOKEN_ID: &str = "0.0.5001";
pub const SCHEMA_IRI: &str = "#meter-reading";

pub fn account(account_id: &str) -> LedgerAccount {
    LedgerAccount {
        account_id: account_id.into(),
        account_key: format!("302e0201-{account_id}"),
    }
}

/// Running engine with the embedded worker, seeded with two accounts, one
/// fungible token and one draft schema. Publishing moves the schema to a versioned IRI, so
/// each harness publishes a single policy.
pub struct Harness {
    pub runtime: PolicyRuntime,
    pub broker: BrokerHandle,
}

impl Harness {
    pub fn start() -> Self {
        let mut config = EngineConfig::default();
        config.runtime.dry_run = true;
        let runtime = PolicyRuntime::new(config).expect("runtime builds");
        let broker = runtime.start().expect("runtime starts");

        let container = runtime.container();
        container.accounts.register(OWNER, account(OWNER_ACCOUNT));
        container.accounts.register(INSTALLER, account(INSTALLER_ACCOUNT));
        container.tokens.insert(Token {
            token_id: TOKEN_ID.into(),
            token_name: "Carbon Credit".into(),
            token_type: TokenType::Fungible,
            decimals: 0,
            owner: OWNER.into(),
            enable_wipe: false,
        });
        container.schemas.insert(Schema {
            id: "schema-meter".into(),
            iri: SCHEMA_IRI.into(),
            name: "Meter reading".into(),
            version: None,
            owner: OWNER.into(),
            topic_id: None,
            status: SchemaStatus::Draft,
            document: json!({"required": ["value"]}),
        });

        Self { runtime, broker }
    }

    pub fn container(&self) -> &ServiceContainer {
        self.runtime.container()
    }

    pub async fn request(&self, request: EngineRequest) -> EngineResponse {
        self.broker.request(request).await.expect("broker is running")
    }

    /// Body of a successful response.
    pub async fn ok(&self, request: EngineRequest) -> Value {
        let response = self.request(request).await;
        assert!(response.is_ok(), "request failed: {:?}", response.error);
        response.body.unwrap_or(Value::Null)
    }

    pub async fn block_id(&self, policy_id: &str, tag: &str) -> String {
        let body = self
            .ok(EngineRequest::BlockByTag {
                policy_id: policy_id.into(),
                tag: tag.into(),
            })
            .await;
        body["id"].as_str().expect("block id").to_string()
    }

    /// Create `policy` and publish it as `1.0.0`.
    pub async fn publish(&self, policy: Policy) {
        let policy_id = policy.id.clone();
        self.ok(EngineRequest::CreatePolicy {
            policy: Box::new(policy),
        })
        .await;
        let body = self
            .ok(EngineRequest::PublishPolicy {
                policy_id,
                owner: OWNER.into(),
                version: "1.0.0".into(),
            })
            .await;
        assert_eq!(body["isValid"], json!(true), "{body}");
    }
}

fn run_edge(source: &str, target: &str) -> EventConfig {
    EventConfig::new(source, target, RUN_EVENT, InputEventType::RunEvent)
}

fn draft(id: &str, root: BlockDefinition) -> Policy {
    let mut policy = Policy::draft(id, OWNER, "Metering");
    policy.config = Some(root.to_config().expect("config serializes"));
    policy
}

/// Request form → save → mint `value * 2` tokens to the submitter.
pub fn metering_policy(id: &str, token_id: &str) -> Policy {
    let request = BlockDefinition::new("requestVcDocumentBlock", "report")
        .with_permissions(&[ANY_ROLE])
        .with_option("schema", json!(SCHEMA_IRI))
        .with_event(run_edge("report", "save"));
    let save = BlockDefinition::new("sendToGuardianBlock", "save")
        .with_permissions(&[ANY_ROLE])
        .with_option("options", json!([{"name": "status", "value": "Approved"}]))
        .with_event(run_edge("save", "mint"));
    let mint = BlockDefinition::new("mintDocumentBlock", "mint")
        .with_permissions(&[ANY_ROLE])
        .with_option("tokenId", json!(token_id))
        .with_option("rule", json!("value * 2"));
    let root = BlockDefinition::new("interfaceContainerBlock", "root")
        .with_permissions(&[ANY_ROLE])
        .with_child(request)
        .with_child(save)
        .with_child(mint);
    draft(id, root)
}

/// External provider entry point → save.
pub fn sensor_policy(id: &str) -> Policy {
    let external = BlockDefinition::new("externalDataBlock", "sensor")
        .with_option("schema", json!(SCHEMA_IRI))
        .with_event(run_edge("sensor", "save"));
    let save = BlockDefinition::new("sendToGuardianBlock", "save").with_permissions(&[ANY_ROLE]);
    let root = BlockDefinition::new("interfaceContainerBlock", "root")
        .with_permissions(&[ANY_ROLE])
        .with_child(external)
        .with_child(save);
    draft(id, root)
}
