//! Ports of the compare engine.

pub mod inbound;
