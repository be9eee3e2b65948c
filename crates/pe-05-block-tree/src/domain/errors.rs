//! Block tree errors.

use crate::domain::formula::FormulaError;
use pe_04_user_state::StateError;
use shared_types::errors::{BlockActionError, StoreError};
use thiserror::Error;

/// Materialization failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("policy has no configuration")]
    EmptyPolicy,

    #[error("invalid policy configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown block types: {}", .0.join(", "))]
    UnknownBlockTypes(Vec<String>),
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("policy {0} is not loaded")]
    PolicyNotFound(String),

    #[error("block {0} not found")]
    BlockNotFound(String),

    #[error("no block tagged '{0}'")]
    TagNotFound(String),

    #[error("permission denied for {user} on block {block}")]
    PermissionDenied { user: String, block: String },

    #[error("{block_type} does not support {operation}")]
    Unsupported {
        block_type: &'static str,
        operation: &'static str,
    },

    #[error(transparent)]
    BlockAction(#[from] BlockActionError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Formula(#[from] FormulaError),
}
