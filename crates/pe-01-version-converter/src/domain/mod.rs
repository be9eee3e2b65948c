//! Domain layer for configuration migration.

pub mod context;
pub mod errors;
pub mod steps;
pub mod version;
