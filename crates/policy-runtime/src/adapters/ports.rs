//! Runtime-owned ports: persistence the subsystems never see directly.

use async_trait::async_trait;
use shared_types::entities::{Did, Policy};
use shared_types::errors::StoreError;

/// Policy aggregates at rest.
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn get(&self, policy_id: &str) -> Result<Option<Policy>, StoreError>;

    /// Insert or replace by id.
    async fn save(&self, policy: Policy) -> Result<Policy, StoreError>;

    async fn find_by_owner(&self, owner: &Did) -> Result<Vec<Policy>, StoreError>;
}
