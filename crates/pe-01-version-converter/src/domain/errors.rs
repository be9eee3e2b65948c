//! Conversion errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// A version string did not parse as dot-separated numbers.
    #[error("Invalid version: {0:?}")]
    InvalidVersion(String),

    /// The configuration root is not a JSON object.
    #[error("Policy configuration root is not an object")]
    NotAnObject,
}
