//! # Broker Message Payloads
//!
//! Request/response payloads of the engine's broker surface and the worker
//! pool protocol (`PUSH_TASK` out, `TASK_COMPLETE_BROADCAST` in).
//!
//! Request payloads carry the acting user's DID as resolved by the gateway;
//! the engine resolves roles itself against the policy.

use crate::entities::{Did, Policy, PolicyId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// =============================================================================
// WORKER POOL PROTOCOL
// =============================================================================

/// Globally unique identifier of a worker task.
///
/// UUID v7, so ids sort by submission time in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Submission time encoded in the id (milliseconds since Unix epoch).
    #[must_use]
    pub fn timestamp_ms(&self) -> Option<u64> {
        self.0.get_timestamp().map(|ts| {
            let (secs, nanos) = ts.to_unix();
            secs * 1000 + u64::from(nanos) / 1_000_000
        })
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Operations the worker pool knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerTaskType {
    MintNft,
    TransferNft,
    MintFt,
    TransferFt,
    WipeToken,
    HttpRequest,
}

impl WorkerTaskType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MintNft => "MINT_NFT",
            Self::TransferNft => "TRANSFER_NFT",
            Self::MintFt => "MINT_FT",
            Self::TransferFt => "TRANSFER_FT",
            Self::WipeToken => "WIPE_TOKEN",
            Self::HttpRequest => "HTTP_REQUEST",
        }
    }
}

impl fmt::Display for WorkerTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work as seen by the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerTask {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: WorkerTaskType,
    /// Operation specific payload (credentials, token ids, amounts, url).
    pub data: Value,
}

/// `PUSH_TASK`: engine -> worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushTaskPayload {
    pub task: WorkerTask,
    pub priority: u8,
    pub is_retryable_task: bool,
    pub attempts: u32,
}

/// `TASK_COMPLETE_BROADCAST`: worker pool -> engine, at-least-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletePayload {
    pub id: TaskId,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskCompletePayload {
    #[must_use]
    pub fn success(id: TaskId, data: Value) -> Self {
        Self {
            id,
            data: Some(data),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: TaskId, error: impl Into<String>) -> Self {
        Self {
            id,
            data: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// ENGINE REQUEST SURFACE
// =============================================================================

/// Authenticated caller as forwarded by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub did: Did,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserRef {
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            username: None,
        }
    }
}

/// Data pushed by an external provider into a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalDataPayload {
    pub policy_tag: String,
    pub block_tag: String,
    /// DID of the organization submitting the document.
    pub owner: Did,
    /// Verifiable credential body.
    pub document: Value,
}

/// Requests accepted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineRequest {
    GetBlockData {
        block_id: String,
        policy_id: PolicyId,
        user: UserRef,
    },
    SetBlockData {
        block_id: String,
        policy_id: PolicyId,
        user: UserRef,
        data: Value,
    },
    BlockByTag {
        policy_id: PolicyId,
        tag: String,
    },
    GetBlockParents {
        block_id: String,
        policy_id: PolicyId,
    },
    ReceiveExternalData(ExternalDataPayload),
    CreatePolicy {
        policy: Box<Policy>,
    },
    SavePolicy {
        policy_id: PolicyId,
        owner: Did,
        config: Value,
    },
    ValidatePolicy {
        policy_id: PolicyId,
    },
    PublishPolicy {
        policy_id: PolicyId,
        owner: Did,
        version: String,
    },
    GetPolicy {
        policy_id: PolicyId,
        user: UserRef,
    },
    AssignRole {
        policy_id: PolicyId,
        owner: Did,
        did: Did,
        role: String,
    },
}

impl EngineRequest {
    /// Broker topic name of the request.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::GetBlockData { .. } => "GET_BLOCK_DATA",
            Self::SetBlockData { .. } => "SET_BLOCK_DATA",
            Self::BlockByTag { .. } => "BLOCK_BY_TAG",
            Self::GetBlockParents { .. } => "GET_BLOCK_PARENTS",
            Self::ReceiveExternalData(_) => "RECEIVE_EXTERNAL_DATA",
            Self::CreatePolicy { .. } => "CREATE_POLICY",
            Self::SavePolicy { .. } => "SAVE_POLICY",
            Self::ValidatePolicy { .. } => "VALIDATE_POLICY",
            Self::PublishPolicy { .. } => "PUBLISH_POLICY",
            Self::GetPolicy { .. } => "GET_POLICY",
            Self::AssignRole { .. } => "ASSIGN_ROLE",
        }
    }
}

/// Error categories surfaced to broker callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    NotFound,
    PermissionDenied,
    BlockAction,
    Validation,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Response to an [`EngineRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl EngineResponse {
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self {
            body: Some(body),
            error: None,
        }
    }

    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            body: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
