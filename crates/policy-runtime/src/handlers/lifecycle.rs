//! # Policy Lifecycle
//!
//! Create, save, validate and publish policies, and manage their roles.
//!
//! ## Publish
//!
//! 1. The version must be `major.minor.patch` and greater than
//!    `previous_version`.
//! 2. Validation must pass; an invalid policy is returned with its report
//!    and left untouched.
//! 3. Every draft schema referenced by the configuration gets a version and
//!    is published; references are rewritten to the published IRI.
//! 4. Block ids in the stored configuration are regenerated, the status
//!    becomes `PUBLISH`, and the tree is rebuilt and swapped in.

use crate::adapters::PolicyRepository;
use pe_01_version_converter::{compare_versions, CodeVersion, ConversionError, PolicyMigration};
use pe_05_block_tree::{PolicyEngine, SchemaRegistry, TreeError, ValidationReport};
use policy_telemetry::metrics::{POLICY_REBUILDS, POLICY_VALIDATION_DURATION};
use policy_telemetry::HistogramTimer;
use serde_json::{json, Value};
use shared_types::entities::{roles, Did, Policy, PolicyStatus, Schema, SchemaStatus};
use shared_types::errors::StoreError;
use shared_types::ipc::UserRef;
use std::cmp::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Configuration fields holding schema IRIs.
const SCHEMA_FIELDS: [&str; 4] = ["schema", "inputSchema", "outputSchema", "presetSchema"];

/// Reported by `GetPolicy` to users with no role at all.
pub const NO_ROLE_LABEL: &str = "The user does not have a role";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("Policy {0} already exists")]
    AlreadyExists(String),

    #[error("Only the policy owner may do this")]
    NotOwner,

    #[error("The policy is empty")]
    EmptyPolicy,

    #[error("Policy is published and cannot be changed")]
    Published,

    #[error("Invalid version format")]
    InvalidVersion,

    #[error("Version must be greater than {0}")]
    VersionNotGreater(String),

    #[error("Role {0} is not defined by the policy")]
    UnknownRole(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cannot serialize policy: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a publish attempt.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub policy: Policy,
    pub report: ValidationReport,
}

impl PublishOutcome {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.report.is_valid
    }
}

pub struct PolicyLifecycle {
    policies: Arc<dyn PolicyRepository>,
    schemas: Arc<dyn SchemaRegistry>,
    converter: Arc<dyn PolicyMigration>,
    engine: Arc<PolicyEngine>,
    dry_run: bool,
}

impl PolicyLifecycle {
    pub fn new(
        policies: Arc<dyn PolicyRepository>,
        schemas: Arc<dyn SchemaRegistry>,
        converter: Arc<dyn PolicyMigration>,
        engine: Arc<PolicyEngine>,
        dry_run: bool,
    ) -> Self {
        Self {
            policies,
            schemas,
            converter,
            engine,
            dry_run,
        }
    }

    async fn load(&self, policy_id: &str) -> Result<Policy, LifecycleError> {
        self.policies
            .get(policy_id)
            .await?
            .ok_or_else(|| LifecycleError::UnknownPolicy(policy_id.to_string()))
    }

    async fn load_owned(&self, policy_id: &str, owner: &Did) -> Result<Policy, LifecycleError> {
        let policy = self.load(policy_id).await?;
        if !policy.is_owner(owner) {
            return Err(LifecycleError::NotOwner);
        }
        Ok(policy)
    }

    fn migrate(&self, policy: &mut Policy) -> Result<(), LifecycleError> {
        if policy.config.is_some() {
            let report = self.converter.convert_policy(policy)?;
            if !report.applied_steps.is_empty() {
                info!(
                    policy_id = %policy.id,
                    from = ?report.from,
                    to = %report.to,
                    changed = report.blocks_changed,
                    "[runtime] policy configuration migrated"
                );
            }
        }
        Ok(())
    }

    /// `CREATE_POLICY`: store a new draft.
    pub async fn create(&self, mut policy: Policy) -> Result<Policy, LifecycleError> {
        if self.policies.get(&policy.id).await?.is_some() {
            return Err(LifecycleError::AlreadyExists(policy.id));
        }
        policy.status = PolicyStatus::Draft;
        self.migrate(&mut policy)?;
        let policy = self.policies.save(policy).await?;
        info!(policy_id = %policy.id, owner = %policy.owner, "[runtime] policy created");
        Ok(policy)
    }

    /// `SAVE_POLICY`: replace the configuration of a draft.
    pub async fn save(
        &self,
        policy_id: &str,
        owner: &Did,
        config: Value,
    ) -> Result<Policy, LifecycleError> {
        let mut policy = self.load_owned(policy_id, owner).await?;
        if policy.is_published() {
            return Err(LifecycleError::Published);
        }
        policy.config = Some(config);
        self.migrate(&mut policy)?;
        Ok(self.policies.save(policy).await?)
    }

    /// `VALIDATE_POLICY`: full report, nothing is stored.
    pub async fn validate(&self, policy_id: &str) -> Result<(Policy, ValidationReport), LifecycleError> {
        let mut policy = self.load(policy_id).await?;
        self.migrate(&mut policy)?;
        let report = self.timed_validation(&policy).await;
        Ok((policy, report))
    }

    async fn timed_validation(&self, policy: &Policy) -> ValidationReport {
        let _timer = HistogramTimer::new(POLICY_VALIDATION_DURATION.clone());
        self.engine.validate(policy).await
    }

    /// `PUBLISH_POLICY`.
    pub async fn publish(
        &self,
        policy_id: &str,
        owner: &Did,
        version: &str,
    ) -> Result<PublishOutcome, LifecycleError> {
        let mut policy = self.load_owned(policy_id, owner).await?;
        if policy.config.is_none() {
            return Err(LifecycleError::EmptyPolicy);
        }
        let parsed: CodeVersion = version
            .parse()
            .map_err(|_| LifecycleError::InvalidVersion)?;
        if !parsed.is_semantic() {
            return Err(LifecycleError::InvalidVersion);
        }
        if compare_versions(version, policy.previous_version.as_deref())? != Ordering::Greater {
            return Err(LifecycleError::VersionNotGreater(
                policy.previous_version.clone().unwrap_or_default(),
            ));
        }

        self.migrate(&mut policy)?;
        let report = self.timed_validation(&policy).await;
        if !report.is_valid {
            info!(
                policy_id,
                errors = report.error_count(),
                "[runtime] publish refused: policy is invalid"
            );
            return Ok(PublishOutcome { policy, report });
        }

        self.publish_schemas(&mut policy, owner).await?;
        if let Some(config) = policy.config.as_mut() {
            regenerate_ids(config);
        }
        policy.status = PolicyStatus::Publish;
        policy.version = Some(version.to_string());
        policy.previous_version = Some(version.to_string());

        self.engine.load_policy(&policy, self.dry_run)?;
        POLICY_REBUILDS.inc();
        let policy = self.policies.save(policy).await?;
        info!(policy_id, version, "[runtime] policy published");
        Ok(PublishOutcome { policy, report })
    }

    async fn publish_schemas(&self, policy: &mut Policy, owner: &Did) -> Result<(), LifecycleError> {
        let Some(config) = policy.config.as_mut() else {
            return Ok(());
        };
        let mut iris = Vec::new();
        collect_schema_iris(config, &mut iris);

        for iri in iris {
            if let Some(published) = publish_schema(self.schemas.as_ref(), &iri, owner).await? {
                if published.iri != iri {
                    replace_schema_iri(config, &iri, &published.iri);
                }
            }
        }
        Ok(())
    }

    /// `GET_POLICY`: the policy as seen by `user`, with `userRoles`.
    pub async fn get(&self, policy_id: &str, user: &UserRef) -> Result<Value, LifecycleError> {
        let policy = self.load(policy_id).await?;
        let mut user_roles = Vec::new();
        if policy.is_owner(&user.did) {
            user_roles.push(roles::ADMINISTRATOR.to_string());
        }
        if let Some(role) = policy.role_of(&user.did) {
            user_roles.push(role.to_string());
        }
        if user_roles.is_empty() {
            user_roles.push(NO_ROLE_LABEL.to_string());
        }

        let mut body = serde_json::to_value(&policy)?;
        if let Some(map) = body.as_object_mut() {
            map.remove("registeredUsers");
            map.insert("userRoles".into(), json!(user_roles));
        }
        Ok(body)
    }

    /// `ASSIGN_ROLE`: register `did` with `role`; the live instance is
    /// updated in place.
    pub async fn assign_role(
        &self,
        policy_id: &str,
        owner: &Did,
        did: &Did,
        role: &str,
    ) -> Result<Policy, LifecycleError> {
        let mut policy = self.load_owned(policy_id, owner).await?;
        if !policy.policy_roles.is_empty() && !policy.policy_roles.iter().any(|r| r == role) {
            return Err(LifecycleError::UnknownRole(role.to_string()));
        }
        policy.registered_users.insert(did.clone(), role.to_string());
        let policy = self.policies.save(policy).await?;

        if let Some(instance) = self.engine.registry().get(policy_id) {
            instance.assign_role(did, role);
        }
        info!(policy_id, did = %did, role, "[runtime] role assigned");
        Ok(policy)
    }

    /// Materialize every published policy of `owner`; used at startup.
    pub async fn restore(&self, owner: &Did) -> Result<usize, LifecycleError> {
        let mut restored = 0;
        for mut policy in self.policies.find_by_owner(owner).await? {
            if !policy.is_published() {
                continue;
            }
            self.migrate(&mut policy)?;
            self.engine.load_policy(&policy, self.dry_run)?;
            POLICY_REBUILDS.inc();
            restored += 1;
        }
        Ok(restored)
    }
}

/// Schema IRIs referenced anywhere in `value`, first occurrence order.
fn collect_schema_iris(value: &Value, iris: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for field in SCHEMA_FIELDS {
                if let Some(iri) = map.get(field).and_then(Value::as_str) {
                    if !iri.is_empty() && !iris.iter().any(|known| known == iri) {
                        iris.push(iri.to_string());
                    }
                }
            }
            map.values().for_each(|v| collect_schema_iris(v, iris));
        }
        Value::Array(items) => items.iter().for_each(|v| collect_schema_iris(v, iris)),
        _ => {}
    }
}

fn replace_schema_iri(value: &mut Value, from: &str, to: &str) {
    match value {
        Value::Object(map) => {
            for field in SCHEMA_FIELDS {
                if let Some(slot) = map.get_mut(field) {
                    if slot.as_str() == Some(from) {
                        *slot = Value::String(to.to_string());
                    }
                }
            }
            map.values_mut().for_each(|v| replace_schema_iri(v, from, to));
        }
        Value::Array(items) => items.iter_mut().for_each(|v| replace_schema_iri(v, from, to)),
        _ => {}
    }
}

/// Fresh `id` on every block of a serialized tree.
fn regenerate_ids(node: &mut Value) {
    let Some(block) = node.as_object_mut() else {
        return;
    };
    block.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    if let Some(children) = block.get_mut("children").and_then(Value::as_array_mut) {
        children.iter_mut().for_each(regenerate_ids);
    }
}

/// Version and publish one referenced schema. Schemas that are already
/// published, or that got no version, are left alone.
async fn publish_schema(
    schemas: &dyn SchemaRegistry,
    iri: &str,
    owner: &Did,
) -> Result<Option<Schema>, StoreError> {
    let schema = schemas.increment_version(iri, owner).await?;
    if schema.status == SchemaStatus::Published {
        return Ok(None);
    }
    let Some(version) = schema.version.as_deref() else {
        return Ok(None);
    };
    schemas.publish(&schema.id, version, owner).await.map(Some)
}
