//! Metric recorders fed from the bus and the dispatcher.

use pe_02_task_dispatcher::{StatsSnapshot, TaskDispatcher};
use policy_telemetry::metrics::{BLOCK_ACTIONS, BLOCK_ERRORS, PENDING_TASKS};
use policy_telemetry::{record_task_counts, task_outcome};
use shared_bus::{EngineEvent, Subscription};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Count block activity and failures by block type.
///
/// The subscription should cover `BlockUpdates` and `External`.
pub async fn run_block_metrics(mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        match event {
            EngineEvent::External(external) => {
                BLOCK_ACTIONS
                    .with_label_values(&[external.block_type.as_str()])
                    .inc();
            }
            EngineEvent::BlockError { block_type, .. } => {
                BLOCK_ERRORS.with_label_values(&[block_type.as_str()]).inc();
            }
            _ => {}
        }
    }
    info!("[runtime] block metrics stopped");
}

/// Advance task counters by the difference between two snapshots.
pub fn record_stats_delta(previous: &StatsSnapshot, current: &StatsSnapshot) {
    record_task_counts(task_outcome::SUBMITTED, current.submitted.saturating_sub(previous.submitted));
    record_task_counts(task_outcome::RESOLVED, current.resolved.saturating_sub(previous.resolved));
    record_task_counts(task_outcome::RETRIED, current.retried.saturating_sub(previous.retried));
    record_task_counts(task_outcome::REJECTED, current.rejected.saturating_sub(previous.rejected));
    record_task_counts(task_outcome::EVICTED, current.evicted.saturating_sub(previous.evicted));
    PENDING_TASKS.set(i64::try_from(current.pending).unwrap_or(i64::MAX));
}

/// Sample dispatcher counters every `interval`.
pub async fn run_dispatcher_sampler(dispatcher: Arc<TaskDispatcher>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut previous = StatsSnapshot::default();
    loop {
        ticker.tick().await;
        let current = dispatcher.stats();
        record_stats_delta(&previous, &current);
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_telemetry::metrics::TASKS;

    #[test]
    fn test_stats_delta_only_adds_the_difference() {
        let resolved = TASKS.with_label_values(&[task_outcome::RESOLVED]);
        let before = resolved.get();
        let previous = StatsSnapshot {
            resolved: 3,
            ..StatsSnapshot::default()
        };
        let current = StatsSnapshot {
            resolved: 5,
            pending: 2,
            ..StatsSnapshot::default()
        };
        record_stats_delta(&previous, &current);
        assert_eq!(resolved.get(), before + 2);
        assert_eq!(PENDING_TASKS.get(), 2);
    }
}
