//! Ports of the block tree.

pub mod inbound;
pub mod outbound;
