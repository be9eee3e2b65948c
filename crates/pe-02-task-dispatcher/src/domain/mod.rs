//! Domain layer for task dispatch.

pub mod entities;
pub mod errors;
pub mod stats;
