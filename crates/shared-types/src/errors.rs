//! # Error Types
//!
//! Errors that cross subsystem boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-facing failure of a block action.
///
/// Aborts only the current user action; the router restores the block's
/// `active` flag before returning it.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{block_type} ({block_id}): {message}")]
#[serde(rename_all = "camelCase")]
pub struct BlockActionError {
    pub block_type: String,
    pub block_id: String,
    pub message: String,
}

impl BlockActionError {
    pub fn new(
        block_type: impl Into<String>,
        block_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            block_type: block_type.into(),
            block_id: block_id.into(),
            message: message.into(),
        }
    }
}

/// Errors from the opaque document/policy stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because of a conflicting entity.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_action_error_display() {
        let err = BlockActionError::new("httpRequestBlock", "b-1", "Invalid response");
        assert_eq!(err.to_string(), "httpRequestBlock (b-1): Invalid response");
    }
}
