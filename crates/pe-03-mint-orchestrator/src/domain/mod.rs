//! Domain layer for token settlement.

pub mod entities;
pub mod errors;
pub mod hash;
pub mod scatter;
