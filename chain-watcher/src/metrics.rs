//! Prometheus metrics for chain watchers

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_gauge_vec, CounterVec, IntGaugeVec};

lazy_static! {
    /// Events seen per chain and routing outcome
    pub static ref WATCHER_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "chain_watcher_events_total",
        "Events seen per chain, event name and routing outcome",
        &["chain", "event_name", "outcome"]
    )
    .unwrap();

    /// Poll cycles that failed with a transient error
    pub static ref WATCHER_POLL_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "chain_watcher_poll_errors_total",
        "Poll cycles that failed with a transient error",
        &["chain"]
    )
    .unwrap();

    /// Last fully-processed block per chain
    pub static ref WATCHER_LAST_PROCESSED_BLOCK: IntGaugeVec = register_int_gauge_vec!(
        "chain_watcher_last_processed_block",
        "Last fully-processed block per chain",
        &["chain"]
    )
    .unwrap();
}
