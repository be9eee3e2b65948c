//! Domain layer of the block tree.

pub mod errors;
pub mod event;
pub mod formula;
pub mod kind;
pub mod options;
pub mod permissions;
pub mod tree;
pub mod validation;
