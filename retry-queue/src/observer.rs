//! Observer hooks fired on queue transitions
//!
//! Exposed to external collaborators for logging and metrics; the queue
//! itself never depends on what an observer does.

use crate::item::QueueItem;
use tracing::{error, info};

/// Queue lifecycle hooks
///
/// All methods default to no-ops so implementors only override what
/// they care about. Hooks carry the full item at the time of the
/// transition.
pub trait QueueObserver: Send + Sync {
    /// A new item was enqueued
    fn on_item_added(&self, _item: &QueueItem) {}

    /// A worker took ownership of the item
    fn on_item_processing(&self, _item: &QueueItem) {}

    /// The item's action was executed and confirmed
    fn on_item_completed(&self, _item: &QueueItem) {}

    /// The item parked in FAILED
    fn on_item_failed(&self, _item: &QueueItem) {}

    /// An attempt failed and the item is being rescheduled
    fn on_item_retry(&self, _item: &QueueItem, _attempt: u32) {}
}

/// Observer that does nothing
#[derive(Debug, Default)]
pub struct NoopObserver;

impl QueueObserver for NoopObserver {}

/// Observer that logs every transition with structured fields
#[derive(Debug, Default)]
pub struct LogObserver;

impl QueueObserver for LogObserver {
    fn on_item_added(&self, item: &QueueItem) {
        info!(
            id = %item.id,
            entrypoint = %item.action.entrypoint,
            target_chain = %item.action.target_chain,
            "Action queued"
        );
    }

    fn on_item_processing(&self, item: &QueueItem) {
        info!(
            id = %item.id,
            entrypoint = %item.action.entrypoint,
            attempt = item.attempt,
            "Processing action"
        );
    }

    fn on_item_completed(&self, item: &QueueItem) {
        info!(
            id = %item.id,
            entrypoint = %item.action.entrypoint,
            attempt = item.attempt,
            "Action completed"
        );
    }

    fn on_item_failed(&self, item: &QueueItem) {
        error!(
            id = %item.id,
            entrypoint = %item.action.entrypoint,
            attempt = item.attempt,
            last_error = item.last_error.as_deref().unwrap_or("unknown"),
            "Action failed permanently"
        );
    }

    fn on_item_retry(&self, item: &QueueItem, attempt: u32) {
        info!(
            id = %item.id,
            entrypoint = %item.action.entrypoint,
            attempt,
            visible_at = %item.visible_at,
            "Retrying action"
        );
    }
}
