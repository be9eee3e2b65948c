//! # Version Converter Subsystem
//!
//! Migrates a serialized policy configuration tree to the shape expected by the
//! current engine (`1.4.0`). Runs once at policy load and save time, upstream
//! of tree materialization.
//!
//! ## Migration Chain
//!
//! | Threshold | Step | Effect |
//! |-----------|------|--------|
//! | 1.0.0 | `RenameLegacyBlockTypes` | Legacy `blockType` names get the `...Block` suffix |
//! | 1.1.0 | `ExplicitEvents` | `dependencies`, selector options, switch conditions and timers become explicit event edges |
//! | 1.2.0 | `SelectorToButtons` | Selector action blocks become `buttonBlock` |
//! | 1.3.0 | `DefaultAccountType` | Mint/retirement blocks default `accountType` to `default` |
//!
//! A step runs when its threshold is strictly greater than the policy's
//! `codeVersion`. Steps run in ascending order on a node, then the walk
//! recurses into the node's children (pre-order).
//!
//! ## Idempotency
//!
//! Every step inspects the node's shape before mutating it, so running the
//! full chain over an already migrated tree changes nothing.
//!
//! ## Module Structure
//!
//! ```text
//! domain/version.rs  - CodeVersion parsing and ordering
//! domain/context.rs  - Sibling/parent context passed to steps
//! domain/steps.rs    - MigrationStep trait and the built-in steps
//! ports/inbound.rs   - PolicyMigration trait
//! service.rs         - PolicyConverter (walk + stamping)
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::context::NodeContext;
pub use domain::errors::ConversionError;
pub use domain::steps::{default_steps, MigrationStep};
pub use domain::version::{compare_versions, CodeVersion};
pub use ports::inbound::PolicyMigration;
pub use service::{ConversionReport, PolicyConverter};

/// Version of the configuration shape produced by this engine.
pub const ENGINE_CODE_VERSION: &str = "1.4.0";
