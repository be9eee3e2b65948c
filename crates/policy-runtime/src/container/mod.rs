//! # Service Container
//!
//! Configuration and dependency injection for the runtime.

pub mod config;
pub mod services;

pub use config::{ConfigError, EngineConfig};
pub use services::ServiceContainer;
