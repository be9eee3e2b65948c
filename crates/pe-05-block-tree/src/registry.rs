//! Materialized policies, one per policy id.
//!
//! An instance is immutable once built apart from roles and user state.
//! Reloading builds a fresh instance and swaps the `Arc` under a write lock,
//! so a reader holds either the old tree or the new one, never a mix.

use crate::domain::errors::{EngineError, TreeError};
use crate::domain::kind::BlockKind;
use crate::domain::tree::BlockTree;
use parking_lot::RwLock;
use pe_04_user_state::{UserStateApi, UserStateStore, ACTIVE_FIELD};
use serde_json::{Map, Value};
use shared_types::entities::{BlockId, Did, Policy, PolicyId, PolicyUser};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Per-user state key of a step container's current child.
pub const STEP_INDEX_FIELD: &str = "index";

pub struct PolicyInstance {
    pub policy_id: PolicyId,
    pub policy_tag: String,
    pub owner: Did,
    pub topic_id: Option<String>,
    pub instance_topic_id: Option<String>,
    pub dry_run: bool,
    pub tree: BlockTree,
    pub state: UserStateStore,
    roles: RwLock<HashMap<Did, String>>,
}

impl PolicyInstance {
    /// Build the tree of `policy` and register per-block state defaults.
    pub fn materialize(policy: &Policy, dry_run: bool) -> Result<Self, TreeError> {
        let config = policy.config.as_ref().ok_or(TreeError::EmptyPolicy)?;
        let tree = BlockTree::from_config(config)?;
        let state = UserStateStore::new();

        for node in tree.nodes() {
            let mut defaults = Map::new();
            if node.about().stateful {
                defaults.insert(ACTIVE_FIELD.into(), Value::Bool(true));
            }
            if node.kind == BlockKind::InterfaceStep {
                defaults.insert(STEP_INDEX_FIELD.into(), Value::from(0));
            }
            if !defaults.is_empty() {
                state.register_defaults(&node.id, defaults);
            }
        }

        Ok(Self {
            policy_id: policy.id.clone(),
            policy_tag: policy.policy_tag.clone(),
            owner: policy.owner.clone(),
            topic_id: policy.topic_id.clone(),
            instance_topic_id: policy.instance_topic_id.clone(),
            dry_run,
            tree,
            state,
            roles: RwLock::new(policy.registered_users.clone()),
        })
    }

    /// Resolve `did` against the policy's roles and owner.
    #[must_use]
    pub fn resolve_user(&self, did: &str, username: Option<&str>) -> PolicyUser {
        let mut user = PolicyUser::new(did);
        user.username = username.map(str::to_string);
        user.role = self.roles.read().get(did).cloned();
        user.is_owner = did == self.owner;
        user
    }

    #[must_use]
    pub fn owner_user(&self) -> PolicyUser {
        self.resolve_user(&self.owner, None)
    }

    #[must_use]
    pub fn role_of(&self, did: &str) -> Option<String> {
        self.roles.read().get(did).cloned()
    }

    pub fn assign_role(&self, did: &str, role: &str) {
        self.roles.write().insert(did.to_string(), role.to_string());
    }

    pub fn node_index(&self, block_id: &BlockId) -> Result<usize, EngineError> {
        self.tree
            .index_of_id(block_id)
            .ok_or_else(|| EngineError::BlockNotFound(block_id.to_string()))
    }
}

#[derive(Default)]
pub struct PolicyRegistry {
    instances: RwLock<HashMap<PolicyId, Arc<PolicyInstance>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `instance`, replacing any previous one for the same policy.
    pub fn install(&self, instance: PolicyInstance) -> Arc<PolicyInstance> {
        let instance = Arc::new(instance);
        let previous = self
            .instances
            .write()
            .insert(instance.policy_id.clone(), Arc::clone(&instance));
        info!(
            policy_id = %instance.policy_id,
            blocks = instance.tree.len(),
            replaced = previous.is_some(),
            "[pe-05] policy materialized"
        );
        instance
    }

    #[must_use]
    pub fn get(&self, policy_id: &str) -> Option<Arc<PolicyInstance>> {
        self.instances.read().get(policy_id).cloned()
    }

    pub fn require(&self, policy_id: &str) -> Result<Arc<PolicyInstance>, EngineError> {
        self.get(policy_id)
            .ok_or_else(|| EngineError::PolicyNotFound(policy_id.to_string()))
    }

    pub fn remove(&self, policy_id: &str) -> Option<Arc<PolicyInstance>> {
        self.instances.write().remove(policy_id)
    }

    /// Instances whose policy tag is `policy_tag`.
    #[must_use]
    pub fn by_policy_tag(&self, policy_tag: &str) -> Vec<Arc<PolicyInstance>> {
        self.instances
            .read()
            .values()
            .filter(|instance| instance.policy_tag == policy_tag)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
