//! Prometheus metrics for the retry queue

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_int_gauge, CounterVec, IntGauge,
};

lazy_static! {
    /// Queue item transitions by resulting status
    pub static ref QUEUE_TRANSITIONS_TOTAL: CounterVec = register_counter_vec!(
        "retry_queue_transitions_total",
        "Queue item transitions by resulting status",
        &["status"]
    )
    .unwrap();

    /// Enqueue calls deduplicated by an existing active item
    pub static ref QUEUE_DEDUP_TOTAL: CounterVec = register_counter_vec!(
        "retry_queue_dedup_total",
        "Enqueue calls absorbed by an existing active item",
        &["entrypoint"]
    )
    .unwrap();

    /// Workers currently executing actions
    pub static ref QUEUE_INFLIGHT: IntGauge = register_int_gauge!(
        "retry_queue_inflight_workers",
        "Workers currently executing actions"
    )
    .unwrap();
}
