//! Ports for the task dispatcher.

pub mod inbound;
pub mod outbound;
