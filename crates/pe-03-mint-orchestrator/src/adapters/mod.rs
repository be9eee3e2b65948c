//! Adapters for the mint orchestrator.

pub mod bus;
