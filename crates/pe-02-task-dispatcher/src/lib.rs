//! # Task Dispatcher Subsystem
//!
//! Submits units of work to the external worker pool and resolves callers when
//! the correlated `TASK_COMPLETE_BROADCAST` arrives.
//!
//! ## Flow
//!
//! ```text
//! caller ──submit()──▶ TaskDispatcher ──PUSH_TASK──▶ worker pool
//!   ▲                      │  ▲                          │
//!   │      oneshot         │  └── TASK_COMPLETE_BROADCAST┘
//!   └──────────────────────┘        (at-least-once)
//! ```
//!
//! 1. `submit()` assigns a fresh `TaskId`, clamps the attempt budget into
//!    `(0, max_attempts]` and records exactly one `ActiveTask`.
//! 2. The task is pushed through the `TaskChannel` outbound port.
//! 3. `handle_completion()` takes the entry out of the map by id:
//!    - unknown id: ignored (duplicate or late delivery)
//!    - success: the caller is resolved with the task data
//!    - error, retryable, budget left: re-pushed under the same id
//!    - error otherwise: the caller is rejected with `TaskError::Failed`
//! 4. `evict_expired()` rejects entries that outlived their deadline.
//!
//! ## Ownership
//!
//! The correlation map is owned by the dispatcher instance; callers hold an
//! `Arc<TaskDispatcher>` (or `Arc<dyn TaskSubmitter>`), never a global.
//!
//! ## Module Structure
//!
//! ```text
//! domain/entities.rs - TaskRequest, ActiveTask, DispatcherConfig
//! domain/errors.rs   - TaskError
//! domain/stats.rs    - DispatcherStats counters
//! ports/inbound.rs   - TaskSubmitter
//! ports/outbound.rs  - TaskChannel
//! adapters/bus.rs    - shared-bus channel and completion listener
//! service.rs         - TaskDispatcher, eviction loop
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::bus::{run_completion_listener, BusTaskChannel};
pub use domain::entities::{clamp_attempts, CompletionOutcome, DispatcherConfig, TaskRequest};
pub use domain::errors::TaskError;
pub use domain::stats::{DispatcherStats, StatsSnapshot};
pub use ports::inbound::TaskSubmitter;
pub use ports::outbound::{ChannelError, TaskChannel};
pub use service::{eviction_task, PendingTask, TaskDispatcher};

/// Attempt budget used when a caller passes an out-of-range value.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;
