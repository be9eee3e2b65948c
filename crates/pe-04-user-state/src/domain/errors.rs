use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state patch must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}
