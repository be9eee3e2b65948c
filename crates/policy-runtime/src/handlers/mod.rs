//! # Handlers
//!
//! Broker-facing request handling and background recorders.

pub mod broker;
pub mod lifecycle;
pub mod metrics;
pub mod requests;

pub use broker::{BrokerError, BrokerHandle, RequestBroker, RequestMessage, ResponseMessage};
pub use lifecycle::{LifecycleError, PolicyLifecycle, PublishOutcome, NO_ROLE_LABEL};
pub use requests::RequestHandler;
