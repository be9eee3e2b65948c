//! Ports for the version converter.

pub mod inbound;
