//! # Request Handler
//!
//! Maps every [`EngineRequest`] onto the block router or the policy
//! lifecycle and folds the outcome into an [`EngineResponse`].

use crate::handlers::lifecycle::{LifecycleError, PolicyLifecycle};
use pe_05_block_tree::{BlockRouter, EngineError, PolicyEngine};
use policy_telemetry::fanout_timer;
use serde_json::{json, Value};
use shared_types::entities::BlockId;
use shared_types::ipc::{EngineRequest, EngineResponse, ErrorCode};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RequestHandler {
    engine: Arc<PolicyEngine>,
    lifecycle: Arc<PolicyLifecycle>,
}

/// Failure of one request, before it is folded into a response.
enum Failure {
    Engine(EngineError),
    Lifecycle(LifecycleError),
}

impl From<EngineError> for Failure {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<LifecycleError> for Failure {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(err)
    }
}

impl Failure {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Engine(err) => match err {
                EngineError::PolicyNotFound(_)
                | EngineError::BlockNotFound(_)
                | EngineError::TagNotFound(_) => ErrorCode::NotFound,
                EngineError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
                EngineError::Unsupported { .. } => ErrorCode::BadRequest,
                EngineError::BlockAction(_) => ErrorCode::BlockAction,
                EngineError::Tree(_) => ErrorCode::Validation,
                EngineError::Store(_) | EngineError::State(_) | EngineError::Formula(_) => {
                    ErrorCode::Internal
                }
            },
            Self::Lifecycle(err) => match err {
                LifecycleError::UnknownPolicy(_) => ErrorCode::NotFound,
                LifecycleError::NotOwner => ErrorCode::PermissionDenied,
                LifecycleError::Tree(_) => ErrorCode::Validation,
                LifecycleError::Store(_) | LifecycleError::Serialization(_) => ErrorCode::Internal,
                LifecycleError::AlreadyExists(_)
                | LifecycleError::EmptyPolicy
                | LifecycleError::Published
                | LifecycleError::InvalidVersion
                | LifecycleError::VersionNotGreater(_)
                | LifecycleError::UnknownRole(_)
                | LifecycleError::Conversion(_) => ErrorCode::BadRequest,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            // Block action messages are shown to the user as-is.
            Self::Engine(EngineError::BlockAction(err)) => err.message.clone(),
            Self::Engine(err) => err.to_string(),
            Self::Lifecycle(err) => err.to_string(),
        }
    }
}

impl RequestHandler {
    pub fn new(engine: Arc<PolicyEngine>, lifecycle: Arc<PolicyLifecycle>) -> Self {
        Self { engine, lifecycle }
    }

    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    pub fn lifecycle(&self) -> &Arc<PolicyLifecycle> {
        &self.lifecycle
    }

    pub async fn handle(&self, request: EngineRequest) -> EngineResponse {
        let topic = request.topic();
        match self.dispatch(request).await {
            Ok(body) => {
                debug!(topic, "[runtime] request served");
                EngineResponse::ok(body)
            }
            Err(failure) => {
                let code = failure.code();
                let message = failure.message();
                warn!(topic, ?code, error = %message, "[runtime] request failed");
                EngineResponse::error(code, message)
            }
        }
    }

    async fn dispatch(&self, request: EngineRequest) -> Result<Value, Failure> {
        match request {
            EngineRequest::GetBlockData {
                block_id,
                policy_id,
                user,
            } => Ok(self
                .engine
                .get_block_data(&policy_id, &BlockId::from(block_id), &user)
                .await?),
            EngineRequest::SetBlockData {
                block_id,
                policy_id,
                user,
                data,
            } => {
                let _timer = fanout_timer("set_block_data");
                Ok(self
                    .engine
                    .set_block_data(&policy_id, &BlockId::from(block_id), &user, data)
                    .await?)
            }
            EngineRequest::BlockByTag { policy_id, tag } => {
                let id = self.engine.block_by_tag(&policy_id, &tag)?;
                Ok(json!({ "id": id.to_string() }))
            }
            EngineRequest::GetBlockParents {
                block_id,
                policy_id,
            } => {
                let parents = self
                    .engine
                    .block_parents(&policy_id, &BlockId::from(block_id))?;
                let ids: Vec<String> = parents.iter().map(ToString::to_string).collect();
                Ok(json!(ids))
            }
            EngineRequest::ReceiveExternalData(payload) => {
                let _timer = fanout_timer("receive_external_data");
                let accepted = self.engine.receive_external_data(payload).await?;
                Ok(json!({ "accepted": accepted }))
            }
            EngineRequest::CreatePolicy { policy } => {
                let policy = self.lifecycle.create(*policy).await?;
                Ok(without_users(&policy)?)
            }
            EngineRequest::SavePolicy {
                policy_id,
                owner,
                config,
            } => {
                let policy = self.lifecycle.save(&policy_id, &owner, config).await?;
                Ok(without_users(&policy)?)
            }
            EngineRequest::ValidatePolicy { policy_id } => {
                let (policy, report) = self.lifecycle.validate(&policy_id).await?;
                Ok(json!({
                    "results": report,
                    "policy": without_users(&policy)?,
                }))
            }
            EngineRequest::PublishPolicy {
                policy_id,
                owner,
                version,
            } => {
                let outcome = self.lifecycle.publish(&policy_id, &owner, &version).await?;
                Ok(json!({
                    "policy": without_users(&outcome.policy)?,
                    "isValid": outcome.is_valid(),
                    "errors": outcome.report,
                }))
            }
            EngineRequest::GetPolicy { policy_id, user } => {
                Ok(self.lifecycle.get(&policy_id, &user).await?)
            }
            EngineRequest::AssignRole {
                policy_id,
                owner,
                did,
                role,
            } => {
                let policy = self
                    .lifecycle
                    .assign_role(&policy_id, &owner, &did, &role)
                    .await?;
                Ok(json!({ "policyId": policy.id, "did": did, "role": role }))
            }
        }
    }
}

/// Serialized policy without `registeredUsers`.
fn without_users(policy: &shared_types::entities::Policy) -> Result<Value, LifecycleError> {
    let mut value = serde_json::to_value(policy)?;
    if let Some(map) = value.as_object_mut() {
        map.remove("registeredUsers");
    }
    Ok(value)
}
