//! Ports for the mint orchestrator.

pub mod inbound;
pub mod outbound;
