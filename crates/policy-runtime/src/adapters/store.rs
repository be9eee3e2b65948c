//! # In-Memory Stores
//!
//! `DashMap`-backed implementations of the persistence ports. A deployment
//! with a database swaps these for adapters with the same traits.

use crate::adapters::ports::PolicyRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use pe_05_block_tree::{DocumentQuery, DocumentStore, SchemaRegistry, TokenRegistry};
use shared_types::entities::{Did, Policy, PolicyDocument, Schema, SchemaStatus, Token};
use shared_types::errors::StoreError;
use tracing::debug;

// =============================================================================
// SCHEMAS
// =============================================================================

/// Schemas keyed by IRI.
#[derive(Default)]
pub struct InMemorySchemaRegistry {
    by_iri: DashMap<String, Schema>,
}

impl InMemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, schema: Schema) {
        self.by_iri.insert(schema.iri.clone(), schema);
    }

    fn find_by_id(&self, schema_id: &str) -> Option<Schema> {
        self.by_iri
            .iter()
            .find(|entry| entry.value().id == schema_id)
            .map(|entry| entry.value().clone())
    }
}

/// `#<uuid>&<version>` form of a published schema IRI.
fn published_iri(iri: &str, version: &str) -> String {
    let base = iri.split('&').next().unwrap_or(iri);
    format!("{base}&{version}")
}

fn next_patch(version: &str) -> Option<String> {
    let mut parts: Vec<u64> = version
        .split('.')
        .map(|part| part.parse().ok())
        .collect::<Option<_>>()?;
    let last = parts.last_mut()?;
    *last += 1;
    Some(
        parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("."),
    )
}

#[async_trait]
impl SchemaRegistry for InMemorySchemaRegistry {
    async fn get_schema_by_iri(
        &self,
        iri: &str,
        topic_id: Option<&str>,
    ) -> Result<Option<Schema>, StoreError> {
        Ok(self.by_iri.get(iri).and_then(|entry| {
            let schema = entry.value();
            let visible = match (&schema.topic_id, topic_id) {
                (Some(own), Some(wanted)) => own == wanted,
                _ => true,
            };
            visible.then(|| schema.clone())
        }))
    }

    async fn publish(
        &self,
        schema_id: &str,
        version: &str,
        owner: &str,
    ) -> Result<Schema, StoreError> {
        let mut schema = self
            .find_by_id(schema_id)
            .ok_or_else(|| StoreError::NotFound(format!("schema {schema_id}")))?;
        if schema.owner != owner {
            return Err(StoreError::Conflict("Invalid owner".to_string()));
        }
        if schema.status == SchemaStatus::Published {
            return Ok(schema);
        }

        self.by_iri.remove(&schema.iri);
        schema.iri = published_iri(&schema.iri, version);
        schema.version = Some(version.to_string());
        schema.status = SchemaStatus::Published;
        debug!(schema_id, iri = %schema.iri, "[runtime] schema published");
        self.insert(schema.clone());
        Ok(schema)
    }

    async fn increment_version(&self, iri: &str, owner: &str) -> Result<Schema, StoreError> {
        let mut entry = self
            .by_iri
            .get_mut(iri)
            .ok_or_else(|| StoreError::NotFound(format!("schema {iri}")))?;
        let schema = entry.value_mut();
        if schema.owner != owner {
            return Err(StoreError::Conflict("Invalid owner".to_string()));
        }
        if schema.status == SchemaStatus::Published {
            return Ok(schema.clone());
        }
        let next = schema
            .version
            .as_deref()
            .and_then(next_patch)
            .unwrap_or_else(|| "1.0.0".to_string());
        schema.version = Some(next);
        Ok(schema.clone())
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Documents in insertion order.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<Vec<PolicyDocument>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(&self, document: PolicyDocument) -> Result<PolicyDocument, StoreError> {
        let mut documents = self.documents.write();
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document.clone(),
            None => documents.push(document.clone()),
        }
        Ok(document)
    }

    async fn find(&self, query: &DocumentQuery) -> Result<Vec<PolicyDocument>, StoreError> {
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect())
    }
}

// =============================================================================
// TOKENS
// =============================================================================

#[derive(Default)]
pub struct InMemoryTokenRegistry {
    tokens: DashMap<String, Token>,
}

impl InMemoryTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: Token) {
        self.tokens.insert(token.token_id.clone(), token);
    }
}

#[async_trait]
impl TokenRegistry for InMemoryTokenRegistry {
    async fn get_token(&self, token_id: &str) -> Result<Option<Token>, StoreError> {
        Ok(self.tokens.get(token_id).map(|entry| entry.value().clone()))
    }
}

// =============================================================================
// POLICIES
// =============================================================================

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    policies: DashMap<String, Policy>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn get(&self, policy_id: &str) -> Result<Option<Policy>, StoreError> {
        Ok(self.policies.get(policy_id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, policy: Policy) -> Result<Policy, StoreError> {
        self.policies.insert(policy.id.clone(), policy.clone());
        Ok(policy)
    }

    async fn find_by_owner(&self, owner: &Did) -> Result<Vec<Policy>, StoreError> {
        let mut policies: Vec<Policy> = self
            .policies
            .iter()
            .filter(|entry| &entry.value().owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        policies.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(policies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft_schema() -> Schema {
        Schema {
            id: "s-1".into(),
            iri: "#reading".into(),
            name: "Reading".into(),
            version: None,
            owner: "did:owner".into(),
            topic_id: None,
            status: SchemaStatus::Draft,
            document: json!({"required": ["value"]}),
        }
    }

    #[tokio::test]
    async fn test_schema_publish_cycle() {
        let schemas = InMemorySchemaRegistry::new();
        schemas.insert(draft_schema());

        let bumped = schemas.increment_version("#reading", "did:owner").await.unwrap();
        assert_eq!(bumped.version.as_deref(), Some("1.0.0"));

        let published = schemas.publish("s-1", "1.0.0", "did:owner").await.unwrap();
        assert_eq!(published.iri, "#reading&1.0.0");
        assert_eq!(published.status, SchemaStatus::Published);
        assert!(schemas.get_schema_by_iri("#reading", None).await.unwrap().is_none());
        assert!(schemas
            .get_schema_by_iri("#reading&1.0.0", None)
            .await
            .unwrap()
            .is_some());

        // Published schemas are left alone.
        let again = schemas
            .increment_version("#reading&1.0.0", "did:owner")
            .await
            .unwrap();
        assert_eq!(again.version.as_deref(), Some("1.0.0"));
    }

    #[tokio::test]
    async fn test_schema_owner_is_checked() {
        let schemas = InMemorySchemaRegistry::new();
        schemas.insert(draft_schema());
        let err = schemas.publish("s-1", "1.0.0", "did:other").await.unwrap_err();
        assert_eq!(err, StoreError::Conflict("Invalid owner".into()));
    }

    #[test]
    fn test_next_patch() {
        assert_eq!(next_patch("1.0.3").as_deref(), Some("1.0.4"));
        assert_eq!(next_patch("x"), None);
    }

    #[tokio::test]
    async fn test_document_save_replaces_by_id() {
        let store = InMemoryDocumentStore::new();
        let mut document = PolicyDocument::new("p1", "did:a", json!({}));
        store.save(document.clone()).await.unwrap();
        document.tag = Some("saved".into());
        store.save(document.clone()).await.unwrap();
        assert_eq!(store.len(), 1);

        let query = DocumentQuery {
            policy_id: "p1".into(),
            tag: Some("saved".into()),
            ..DocumentQuery::default()
        };
        assert_eq!(store.find(&query).await.unwrap().len(), 1);
    }
}
