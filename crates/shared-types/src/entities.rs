//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Policy**: `Policy`, `PolicyStatus`, `BlockDefinition`, `EventConfig`
//! - **Identity**: `Did`, `PolicyUser`, role constants
//! - **Documents & Schemas**: `PolicyDocument`, `DocumentPayload`, `Schema`
//! - **Settlement**: `Token`, `LedgerAccount`, `MultiPolicyLink`, `SettlementRecord`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: THE POLICY
// =============================================================================

/// Decentralized identifier of a user or organization.
pub type Did = String;

/// Identifier of a stored policy.
pub type PolicyId = String;

/// Identifier of a materialized block instance.
///
/// Regenerated on every materialization; never use it as a routing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    /// Generate a fresh random block id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PolicyStatus {
    #[default]
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(rename = "PUBLISH")]
    Publish,
}

/// Aggregate root of an executable workflow.
///
/// `config` is kept in its serialized form; it is migrated by the version
/// converter and parsed into [`BlockDefinition`] only when a tree is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: PolicyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// DID of the policy owner.
    pub owner: Did,
    /// Tag used by external data providers to address this policy.
    pub policy_tag: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub instance_topic_id: Option<String>,
    /// Root block definition, serialized.
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub previous_version: Option<String>,
    #[serde(default)]
    pub status: PolicyStatus,
    /// did -> role
    #[serde(default)]
    pub registered_users: HashMap<Did, String>,
    /// Engine version the configuration was last migrated to.
    #[serde(default)]
    pub code_version: Option<String>,
    #[serde(default)]
    pub policy_roles: Vec<String>,
}

impl Policy {
    /// Create an empty draft owned by `owner`.
    #[must_use]
    pub fn draft(id: impl Into<String>, owner: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            policy_tag: format!("Tag_{id}"),
            id,
            name: name.into(),
            description: None,
            owner: owner.into(),
            topic_id: None,
            instance_topic_id: None,
            config: None,
            version: None,
            previous_version: None,
            status: PolicyStatus::Draft,
            registered_users: HashMap::new(),
            code_version: None,
            policy_roles: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_owner(&self, did: &str) -> bool {
        self.owner == did
    }

    /// Role registered for `did`, if any.
    #[must_use]
    pub fn role_of(&self, did: &str) -> Option<&str> {
        self.registered_users.get(did).map(String::as_str)
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == PolicyStatus::Publish
    }
}

/// A node of the policy configuration tree.
///
/// Variant-specific options are kept in `options` and parsed by the block
/// variant when the tree is materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub block_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub children: Vec<BlockDefinition>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub events: Vec<EventConfig>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl BlockDefinition {
    /// Parse a serialized configuration tree.
    pub fn from_config(config: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(config)
    }

    /// Minimal definition, mostly useful when assembling trees in code.
    #[must_use]
    pub fn new(block_type: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: None,
            block_type: block_type.into(),
            tag: Some(tag.into()),
            children: Vec::new(),
            permissions: Vec::new(),
            events: Vec::new(),
            options: Map::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: BlockDefinition) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| (*p).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_event(mut self, event: EventConfig) -> Self {
        self.events.push(event);
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }

    /// Serialize back to the at-rest form.
    pub fn to_config(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Number of nodes in this subtree, including `self`.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

// =============================================================================
// CLUSTER B: EVENTS
// =============================================================================

/// Well-known output event types. Blocks may also emit custom outputs
/// (button tags, switch condition tags).
pub mod output_events {
    pub const RUN_EVENT: &str = "RunEvent";
    pub const REFRESH_EVENT: &str = "RefreshEvent";
    pub const ERROR_EVENT: &str = "ErrorEvent";
    pub const RELEASE_EVENT: &str = "ReleaseEvent";
    pub const TIMER_EVENT: &str = "TimerEvent";
    pub const DROPDOWN_EVENT: &str = "DropdownEvent";
}

/// Input handler a block exposes to incoming edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputEventType {
    RunEvent,
    RefreshEvent,
    RestoreEvent,
    TimerEvent,
    ReleaseEvent,
    #[serde(other)]
    Unknown,
}

impl InputEventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunEvent => "RunEvent",
            Self::RefreshEvent => "RefreshEvent",
            Self::RestoreEvent => "RestoreEvent",
            Self::TimerEvent => "TimerEvent",
            Self::ReleaseEvent => "ReleaseEvent",
            Self::Unknown => "Unknown",
        }
    }
}

/// Whose identity an edge delivers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventActor {
    /// The user who started the chain of events.
    #[serde(rename = "initiator")]
    EventInitiator,
    /// The policy owner.
    #[serde(rename = "owner")]
    Owner,
}

impl EventActor {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventInitiator => "initiator",
            Self::Owner => "owner",
        }
    }
}

/// A directed edge between two blocks, addressed by tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConfig {
    pub source: String,
    pub target: String,
    pub input: InputEventType,
    pub output: String,
    /// `None` passes the current acting user through unchanged.
    #[serde(default, deserialize_with = "deserialize_actor")]
    pub actor: Option<EventActor>,
    #[serde(default)]
    pub disabled: bool,
}

impl EventConfig {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        output: impl Into<String>,
        input: InputEventType,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            input,
            output: output.into(),
            actor: None,
            disabled: false,
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor: EventActor) -> Self {
        self.actor = Some(actor);
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }
}

/// Legacy configurations store the pass-through actor as an empty string.
fn deserialize_actor<'de, D>(deserializer: D) -> Result<Option<EventActor>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some("initiator") => Ok(Some(EventActor::EventInitiator)),
        Some("owner") => Ok(Some(EventActor::Owner)),
        Some(other) => Err(serde::de::Error::unknown_variant(
            other,
            &["", "initiator", "owner"],
        )),
    }
}

// =============================================================================
// CLUSTER C: IDENTITY
// =============================================================================

/// Reserved permission values.
pub mod roles {
    /// Any user, with or without a role.
    pub const ANY_ROLE: &str = "ANY_ROLE";
    /// Users without a registered role.
    pub const NO_ROLE: &str = "NO_ROLE";
    /// The policy owner.
    pub const OWNER: &str = "OWNER";
    /// Role reported to the owner by `GetPolicy`.
    pub const ADMINISTRATOR: &str = "Administrator";
}

/// A user resolved against one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyUser {
    pub did: Did,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
}

impl PolicyUser {
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            username: None,
            role: None,
            is_owner: false,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn as_owner(mut self) -> Self {
        self.is_owner = true;
        self
    }

    /// Key used to scope per-user block state.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.did
    }
}

// =============================================================================
// CLUSTER D: DOCUMENTS & SCHEMAS
// =============================================================================

/// A credential (or raw document) produced or consumed by a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDocument {
    pub id: String,
    pub policy_id: PolicyId,
    /// Tag of the block that stored the document.
    #[serde(default)]
    pub tag: Option<String>,
    pub owner: Did,
    /// Schema IRI.
    #[serde(default)]
    pub schema: Option<String>,
    /// Credential body.
    pub document: Value,
    #[serde(default)]
    pub hash: Option<String>,
    /// Free-form metadata (status, approver, ...).
    #[serde(default)]
    pub option: Map<String, Value>,
    #[serde(default)]
    pub relationships: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PolicyDocument {
    #[must_use]
    pub fn new(policy_id: impl Into<String>, owner: impl Into<String>, document: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            policy_id: policy_id.into(),
            tag: None,
            owner: owner.into(),
            schema: None,
            document,
            hash: None,
            option: Map::new(),
            relationships: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Credential subjects of a VC body; a lone object is returned as one entry.
    #[must_use]
    pub fn credential_subjects(&self) -> Vec<&Value> {
        match self.document.get("credentialSubject") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(subject) => vec![subject],
            None => Vec::new(),
        }
    }
}

/// Documents carried by an event: a single document or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentPayload {
    Many(Vec<PolicyDocument>),
    Single(Box<PolicyDocument>),
}

impl DocumentPayload {
    #[must_use]
    pub fn single(document: PolicyDocument) -> Self {
        Self::Single(Box::new(document))
    }

    #[must_use]
    pub fn documents(&self) -> Vec<&PolicyDocument> {
        match self {
            Self::Single(document) => vec![document.as_ref()],
            Self::Many(documents) => documents.iter().collect(),
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<&PolicyDocument> {
        match self {
            Self::Single(document) => Some(document.as_ref()),
            Self::Many(documents) => documents.first(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SchemaStatus {
    #[default]
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(rename = "PUBLISHED")]
    Published,
}

/// Schema as exposed by the schema registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: String,
    pub iri: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub owner: Did,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default)]
    pub status: SchemaStatus,
    /// JSON schema body.
    #[serde(default)]
    pub document: Value,
}

impl Schema {
    /// Property names declared as required by the schema body.
    #[must_use]
    pub fn required_fields(&self) -> Vec<&str> {
        self.document
            .get("required")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

// =============================================================================
// CLUSTER E: SETTLEMENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "fungible")]
    Fungible,
    #[serde(rename = "non-fungible")]
    NonFungible,
}

/// Ledger token known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub token_id: String,
    pub token_name: String,
    pub token_type: TokenType,
    #[serde(default)]
    pub decimals: u32,
    /// DID of the organization holding the token keys.
    pub owner: Did,
    #[serde(default)]
    pub enable_wipe: bool,
}

/// Ledger account credentials of a DID.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccount {
    pub account_id: String,
    pub account_key: String,
}

impl fmt::Debug for LedgerAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerAccount")
            .field("account_id", &self.account_id)
            .field("account_key", &"<redacted>")
            .finish()
    }
}

/// Role of a policy instance inside a federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederationRole {
    Main,
    Member,
}

/// Association of a user in a policy instance with a federation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPolicyLink {
    pub instance_topic_id: String,
    pub user_did: Did,
    pub role: FederationRole,
    pub synchronization_topic_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementStatus {
    Waiting,
    Completed,
    Failed,
}

/// Pending federated mint kept by the federation's main instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub id: String,
    pub policy_id: PolicyId,
    pub owner: Did,
    /// Ledger account of the minting user.
    pub account_id: String,
    pub hash: String,
    pub token_id: String,
    pub amount: u64,
    pub target: String,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_definition_keeps_options() {
        let config = json!({
            "blockType": "httpRequestBlock",
            "tag": "fetch",
            "url": "https://example.org",
            "method": "GET",
            "children": []
        });
        let block = BlockDefinition::from_config(&config).unwrap();
        assert_eq!(block.block_type, "httpRequestBlock");
        assert_eq!(block.tag.as_deref(), Some("fetch"));
        assert_eq!(block.options.get("method"), Some(&json!("GET")));
        assert!(block.events.is_empty());
    }

    #[test]
    fn test_event_actor_legacy_empty_string() {
        let edge: EventConfig = serde_json::from_value(json!({
            "source": "a",
            "target": "b",
            "input": "RunEvent",
            "output": "RunEvent",
            "actor": ""
        }))
        .unwrap();
        assert_eq!(edge.actor, None);
        assert!(!edge.disabled);

        let owner: EventConfig = serde_json::from_value(json!({
            "source": "a",
            "target": "b",
            "input": "RefreshEvent",
            "output": "RunEvent",
            "actor": "owner"
        }))
        .unwrap();
        assert_eq!(owner.actor, Some(EventActor::Owner));
    }

    #[test]
    fn test_unknown_input_event() {
        let edge: EventConfig = serde_json::from_value(json!({
            "source": "a",
            "target": "b",
            "input": "PopEvent",
            "output": "RunEvent"
        }))
        .unwrap();
        assert_eq!(edge.input, InputEventType::Unknown);
    }

    #[test]
    fn test_document_payload_untagged() {
        let doc = PolicyDocument::new("p1", "did:owner", json!({"credentialSubject": [{"id": "x"}]}));
        let single = serde_json::to_value(DocumentPayload::single(doc.clone())).unwrap();
        let parsed: DocumentPayload = serde_json::from_value(single).unwrap();
        assert_eq!(parsed.first().map(|d| d.id.as_str()), Some(doc.id.as_str()));

        let many = DocumentPayload::Many(vec![doc.clone(), doc]);
        assert_eq!(many.documents().len(), 2);
    }

    #[test]
    fn test_ledger_account_debug_redacts_key() {
        let account = LedgerAccount {
            account_id: "0.0.1".into(),
            account_key: "secret".into(),
        };
        assert!(!format!("{account:?}").contains("secret"));
    }

    #[test]
    fn test_policy_roles() {
        let mut policy = Policy::draft("p1", "did:owner", "Demo");
        policy.registered_users.insert("did:user".into(), "Registrant".into());
        assert!(policy.is_owner("did:owner"));
        assert_eq!(policy.role_of("did:user"), Some("Registrant"));
        assert_eq!(policy.role_of("did:other"), None);
        assert_eq!(policy.policy_tag, "Tag_p1");
    }
}
