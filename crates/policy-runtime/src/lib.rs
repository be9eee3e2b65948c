//! # Policy Engine Runtime
//!
//! Process wiring for the policy engine: configuration, the service
//! container, in-memory adapters for every outbound port, the broker request
//! surface and the background loops.
//!
//! ## Modular Structure
//!
//! - `container/` - configuration and dependency injection
//! - `adapters/` - in-memory port implementations and the embedded worker
//! - `handlers/` - request handling, policy lifecycle, metric recorders
//! - `runtime.rs` - loop supervision and shutdown
//!
//! ## Request Flow
//!
//! ```text
//! EngineMessage<EngineRequest>
//!        │
//!        ↓
//!  RequestBroker ──→ RequestHandler ──┬──→ PolicyEngine (block requests)
//!                                     └──→ PolicyLifecycle (policy CRUD)
//!                                                │
//!                             TaskDispatcher ←── MintOrchestrator
//!                                   │ PUSH_TASK        ↑
//!                                   ↓                  │
//!                          EmbeddedWorker ──TASK_COMPLETE_BROADCAST
//! ```

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod runtime;

pub use container::{ConfigError, EngineConfig, ServiceContainer};
pub use handlers::{BrokerHandle, LifecycleError, PolicyLifecycle, RequestHandler};
pub use runtime::PolicyRuntime;
