//! # Compare Engine
//!
//! Content fingerprints for policy block trees.
//!
//! A block's property weight hashes its type and, depending on
//! [`PropertyLevel`], its options and permissions. Its full weight folds in
//! the children's weights, ordered or sorted per [`ChildrenLevel`]. An edge
//! hashes the weights of its resolved endpoints plus its own
//! actor/disabled/input/output fields.
//!
//! Two graphs are structurally equal at a tag iff the weights there match.
//! Tags are the comparison keys; block ids never participate.

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::fingerprint::{canonical, Fingerprinter};
pub use domain::model::{BlockModel, EdgeModel, PolicyModel};
pub use domain::options::{ChildrenLevel, CompareOptions, EventLevel, PropertyLevel};
pub use domain::result::{BlockComparison, CompareResult, CompareStatus, EdgeComparison};
pub use ports::inbound::PolicyComparator;
pub use service::CompareEngine;
