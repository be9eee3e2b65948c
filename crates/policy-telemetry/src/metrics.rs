//! Prometheus metrics for the policy engine.
//!
//! All metrics follow the naming convention: `pe_<area>_<metric>_<unit>`
//!
//! Dispatcher counters mirror `DispatcherStats` and are advanced by deltas
//! with [`record_task_counts`]; everything else is incremented at the call
//! site.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

/// Label values of [`TASKS`].
pub mod task_outcome {
    pub const SUBMITTED: &str = "submitted";
    pub const RESOLVED: &str = "resolved";
    pub const RETRIED: &str = "retried";
    pub const REJECTED: &str = "rejected";
    pub const EVICTED: &str = "evicted";
}

const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TASK DISPATCHER (pe-02)
    // =========================================================================

    /// Task lifecycle transitions by outcome
    pub static ref TASKS: IntCounterVec = IntCounterVec::new(
        Opts::new("pe_dispatcher_tasks_total", "Worker task lifecycle transitions"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Tasks waiting for a completion broadcast
    pub static ref PENDING_TASKS: IntGauge = IntGauge::new(
        "pe_dispatcher_tasks_pending",
        "Number of tasks awaiting a worker result"
    ).expect("metric creation failed");

    // =========================================================================
    // MINT ORCHESTRATOR (pe-03)
    // =========================================================================

    /// Mint and transfer chunks by outcome (succeeded/failed)
    pub static ref MINT_CHUNKS: IntCounterVec = IntCounterVec::new(
        Opts::new("pe_mint_chunks_total", "Ledger mint and transfer chunks"),
        &["phase", "outcome"]
    ).expect("metric creation failed");

    /// Federation settlements handed to the main instance
    pub static ref FEDERATED_MINTS: IntCounter = IntCounter::new(
        "pe_mint_federated_total",
        "Mints settled through a federation link"
    ).expect("metric creation failed");

    // =========================================================================
    // BLOCK TREE (pe-05)
    // =========================================================================

    /// Externally visible block activity by block type
    pub static ref BLOCK_ACTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("pe_block_actions_total", "Block actions reported on the bus"),
        &["block_type"]
    ).expect("metric creation failed");

    /// Failed block actions by block type
    pub static ref BLOCK_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("pe_block_errors_total", "Block actions that failed"),
        &["block_type"]
    ).expect("metric creation failed");

    /// Time from a user or external request to the end of its event cascade
    pub static ref EVENT_FANOUT_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "pe_event_fanout_duration_seconds",
            "Time spent routing an entry request through the block tree"
        ).buckets(LATENCY_BUCKETS.to_vec()),
        &["entry"]
    ).expect("metric creation failed");

    /// Trees materialized from a policy configuration
    pub static ref POLICY_REBUILDS: IntCounter = IntCounter::new(
        "pe_policy_rebuilds_total",
        "Number of policy trees built and swapped into the registry"
    ).expect("metric creation failed");

    /// Publish-time validation duration
    pub static ref POLICY_VALIDATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "pe_policy_validation_duration_seconds",
            "Time spent validating a policy"
        ).buckets(LATENCY_BUCKETS.to_vec())
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TASKS.clone()),
        Box::new(PENDING_TASKS.clone()),
        Box::new(MINT_CHUNKS.clone()),
        Box::new(FEDERATED_MINTS.clone()),
        Box::new(BLOCK_ACTIONS.clone()),
        Box::new(BLOCK_ERRORS.clone()),
        Box::new(EVENT_FANOUT_DURATION.clone()),
        Box::new(POLICY_REBUILDS.clone()),
        Box::new(POLICY_VALIDATION_DURATION.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render the registry in the Prometheus text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Advance a task outcome counter by `delta`.
pub fn record_task_counts(outcome: &str, delta: u64) {
    if delta > 0 {
        TASKS.with_label_values(&[outcome]).inc_by(delta);
    }
}

/// Count mint and transfer chunks of one ledger settlement.
pub fn record_mint_chunks(phase: &str, succeeded: usize, failed: usize) {
    MINT_CHUNKS
        .with_label_values(&[phase, "succeeded"])
        .inc_by(succeeded as u64);
    MINT_CHUNKS
        .with_label_values(&[phase, "failed"])
        .inc_by(failed as u64);
}

/// Observes elapsed time into a histogram when dropped.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            histogram,
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

/// Start timing one fan-out cascade started by `entry`.
pub fn fanout_timer(entry: &str) -> HistogramTimer {
    HistogramTimer::new(EVENT_FANOUT_DURATION.with_label_values(&[entry]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_encode_contains_registered_metrics() {
        register_metrics().unwrap();
        POLICY_REBUILDS.inc();
        record_task_counts(task_outcome::SUBMITTED, 2);
        let text = encode_metrics().unwrap();
        assert!(text.contains("pe_policy_rebuilds_total"));
        assert!(text.contains("pe_dispatcher_tasks_total{outcome=\"submitted\"}"));
    }

    #[test]
    fn test_zero_delta_is_skipped() {
        let before = TASKS.with_label_values(&["unused"]).get();
        record_task_counts("unused", 0);
        assert_eq!(TASKS.with_label_values(&["unused"]).get(), before);
    }

    #[test]
    fn test_timer_observes_on_drop() {
        let histogram = EVENT_FANOUT_DURATION.with_label_values(&["test"]);
        let before = histogram.get_sample_count();
        {
            let _timer = fanout_timer("test");
        }
        assert_eq!(histogram.get_sample_count(), before + 1);
    }
}
