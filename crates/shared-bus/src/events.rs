//! # Engine Events
//!
//! Defines all event types that flow through the shared bus.
//! Worker payloads correspond to `shared-types/src/ipc.rs`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::entities::{Did, PolicyId};
use shared_types::ipc::{PushTaskPayload, TaskCompletePayload};

/// Kinds of externally observable block activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalEventType {
    Run,
    Set,
    StepChanged,
    DocumentSaved,
    Http,
    TokenMinted,
    TokenWiped,
}

/// Notification about block activity, consumed by audit and analytics sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub event_type: ExternalEventType,
    pub policy_id: PolicyId,
    pub block_type: String,
    pub block_tag: Option<String>,
    pub user: Option<Did>,
    pub data: Value,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    // =========================================================================
    // WORKER POOL
    // =========================================================================
    /// `PUSH_TASK`. Source: task dispatcher | Target: worker pool
    PushTask(PushTaskPayload),

    /// `TASK_COMPLETE_BROADCAST`. Source: worker pool | Target: task dispatcher
    TaskComplete(TaskCompletePayload),

    // =========================================================================
    // BLOCK TREE
    // =========================================================================
    /// A block's render state changed for `user`; the UI should refetch.
    BlockUpdated {
        policy_id: PolicyId,
        block_id: String,
        user: Did,
    },

    /// A block action failed for `user`.
    BlockError {
        policy_id: PolicyId,
        block_type: String,
        block_id: String,
        user: Did,
        message: String,
    },

    /// Audit/analytics notification.
    External(ExternalEvent),

    // =========================================================================
    // SETTLEMENT
    // =========================================================================
    /// Tokens were minted and transferred to `target`.
    TokenMinted {
        policy_id: PolicyId,
        token_id: String,
        amount: u64,
        memo: String,
        target: String,
    },

    /// Federation settlement message for `topic_id`.
    Synchronization { topic_id: String, message: Value },
}

impl EngineEvent {
    /// Get the topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::PushTask(_) => EventTopic::WorkerTasks,
            Self::TaskComplete(_) => EventTopic::TaskCompletion,
            Self::BlockUpdated { .. } | Self::BlockError { .. } => EventTopic::BlockUpdates,
            Self::External(_) | Self::TokenMinted { .. } => EventTopic::External,
            Self::Synchronization { .. } => EventTopic::Federation,
        }
    }

    /// Name of the component that emits this event.
    #[must_use]
    pub fn source(&self) -> &'static str {
        match self {
            Self::PushTask(_) => "task-dispatcher",
            Self::TaskComplete(_) => "worker-pool",
            Self::BlockUpdated { .. } | Self::BlockError { .. } | Self::External(_) => {
                "block-tree"
            }
            Self::TokenMinted { .. } | Self::Synchronization { .. } => "mint-orchestrator",
        }
    }
}

/// Event topics for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    WorkerTasks,
    TaskCompletion,
    BlockUpdates,
    External,
    Federation,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Sources to include. Empty means all sources.
    pub sources: Vec<&'static str>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            sources: Vec::new(),
        }
    }

    /// Create a filter for events from specific sources.
    #[must_use]
    pub fn from_sources(sources: Vec<&'static str>) -> Self {
        Self {
            topics: Vec::new(),
            sources,
        }
    }

    /// Stable name of the filter's topic set, `*` for every topic.
    #[must_use]
    pub fn label(&self) -> String {
        if self.topics.is_empty() || self.topics.contains(&EventTopic::All) {
            return "*".to_string();
        }
        let mut names: Vec<String> = self.topics.iter().map(|t| format!("{t:?}")).collect();
        names.sort();
        names.dedup();
        names.join(",")
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &EngineEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let source_match = self.sources.is_empty() || self.sources.contains(&event.source());

        topic_match && source_match
    }
}
