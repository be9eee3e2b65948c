//! # Shared Types Crate
//!
//! Domain entities, broker message types, and the `EngineMessage<T>` envelope
//! shared by every policy engine subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Tags route, ids do not**: a block's `tag` is the only routing key that
//!   survives a publish; block ids are regenerated on every materialization.
//! - **Raw configuration at rest**: `Policy::config` keeps the serialized tree so
//!   version migration can inspect fields the typed model does not know about.

pub mod entities;
pub mod envelope;
pub mod errors;
pub mod ipc;

pub use entities::*;
pub use envelope::EngineMessage;
pub use errors::*;
pub use ipc::*;
