//! # Shared Bus - Event Bus for the Policy Engine
//!
//! Carries the worker pool protocol (`PUSH_TASK`, `TASK_COMPLETE_BROADCAST`),
//! block update/error notifications, external audit events and federation
//! synchronization messages between subsystems.
//!
//! ```text
//! ┌──────────────┐    PushTask     ┌──────────────┐
//! │ Dispatcher   │ ──────────────▶ │  Event Bus   │ ──▶ worker pool
//! │              │ ◀────────────── │              │ ◀── TaskComplete
//! └──────────────┘  TaskComplete   └──────────────┘
//! ```
//!
//! Delivery to the dispatcher is at-least-once; consumers must tolerate
//! duplicates.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{EngineEvent, EventFilter, EventTopic, ExternalEvent, ExternalEventType};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError, SubscriptionTracker};

/// Current protocol version for event bus messages.
pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
