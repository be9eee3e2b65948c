//! # `EngineMessage` Envelope
//!
//! Wrapper for every request and response crossing the broker.
//!
//! - **Versioning**: All messages include a `version` field for forward compatibility.
//! - **Correlation**: Responses copy the request's `correlation_id`.
//! - **Staleness**: Requests older than `MAX_AGE` seconds are refused by the runtime.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The message envelope for broker communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMessage<T> {
    /// Protocol version. MUST be checked before processing.
    pub version: u16,

    /// Name of the sending service.
    pub sender: String,

    /// For requests: a fresh UUID. For responses: the request's UUID.
    pub correlation_id: Uuid,

    /// Topic the response should be published on.
    pub reply_to: Option<String>,

    /// Unix timestamp (seconds) when the message was created.
    pub timestamp: i64,

    pub payload: T,
}

impl<T> EngineMessage<T> {
    /// Current protocol version.
    pub const CURRENT_VERSION: u16 = 1;

    /// Maximum age for valid requests (seconds).
    pub const MAX_AGE: i64 = 60;

    /// Wrap a new request.
    pub fn new(sender: impl Into<String>, payload: T) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            sender: sender.into(),
            correlation_id: Uuid::new_v4(),
            reply_to: None,
            timestamp: Utc::now().timestamp(),
            payload,
        }
    }

    #[must_use]
    pub fn with_reply_to(mut self, topic: impl Into<String>) -> Self {
        self.reply_to = Some(topic.into());
        self
    }

    /// Build the response envelope for this request.
    pub fn reply<R>(&self, sender: impl Into<String>, payload: R) -> EngineMessage<R> {
        EngineMessage {
            version: Self::CURRENT_VERSION,
            sender: sender.into(),
            correlation_id: self.correlation_id,
            reply_to: None,
            timestamp: Utc::now().timestamp(),
            payload,
        }
    }

    #[must_use]
    pub fn is_supported_version(&self) -> bool {
        self.version == Self::CURRENT_VERSION
    }

    /// True when the message is older than `MAX_AGE` relative to `now`.
    #[must_use]
    pub fn is_stale(&self, now: i64) -> bool {
        now - self.timestamp > Self::MAX_AGE
    }
}
