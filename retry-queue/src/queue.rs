//! Retry queue manager
//!
//! `enqueue` is idempotent per idempotency key; `drain` runs the
//! scheduling loop that fans out to a bounded worker pool. Workers own
//! exactly one item for their lifetime, so item updates never race.

use crate::item::{QueueItem, QueueStatus};
use crate::metrics::{QUEUE_DEDUP_TOTAL, QUEUE_INFLIGHT, QUEUE_TRANSITIONS_TOTAL};
use crate::observer::{NoopObserver, QueueObserver};
use crate::storage::QueueStore;
use crate::BACKOFF_SHIFT_CAP;
use chrono::Utc;
use relay_core::config::QueueConfig;
use relay_core::types::{Action, ChainId};
use relay_core::{ActionExecutor, Error, ExecutionReceipt, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Backoff before the retry following failed attempt `attempt`
///
/// Doubles per attempt from `base_secs`, with the shift capped so the
/// delay stays bounded however high `max_attempts` is configured.
pub fn retry_delay(base_secs: u64, attempt: u32) -> chrono::Duration {
    let shift = attempt.saturating_sub(1).min(BACKOFF_SHIFT_CAP);
    chrono::Duration::seconds((base_secs << shift) as i64)
}

/// Durable at-least-once action queue
#[derive(Clone)]
pub struct RetryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn QueueStore>,
    executors: RwLock<HashMap<ChainId, Arc<dyn ActionExecutor>>>,
    observer: Arc<dyn QueueObserver>,
    config: QueueConfig,
}

impl RetryQueue {
    /// Create a queue over `store` with no observer
    pub fn new(store: Arc<dyn QueueStore>, config: QueueConfig) -> Self {
        Self::with_observer(store, config, Arc::new(NoopObserver))
    }

    /// Create a queue over `store` with transition hooks
    pub fn with_observer(
        store: Arc<dyn QueueStore>,
        config: QueueConfig,
        observer: Arc<dyn QueueObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                executors: RwLock::new(HashMap::new()),
                observer,
                config,
            }),
        }
    }

    /// Register the executor for a target chain
    pub async fn register_executor(&self, chain_id: ChainId, executor: Arc<dyn ActionExecutor>) {
        let mut executors = self.inner.executors.write().await;
        executors.insert(chain_id, executor);
    }

    /// Enqueue an action, idempotently
    ///
    /// If a non-terminal item already holds the action's idempotency
    /// key, that item's id is returned and nothing is inserted.
    pub async fn enqueue(&self, action: Action) -> Result<Uuid> {
        if let Some(existing) = self
            .inner
            .store
            .find_active(&action.idempotency_key)
            .await?
        {
            debug!(
                id = %existing.id,
                idempotency_key = %action.idempotency_key,
                "Enqueue absorbed by active item"
            );
            QUEUE_DEDUP_TOTAL
                .with_label_values(&[action.entrypoint.as_str()])
                .inc();
            return Ok(existing.id);
        }

        let item = QueueItem::new(action, self.inner.config.max_attempts);
        self.inner.store.insert(&item).await?;

        info!(
            id = %item.id,
            entrypoint = %item.action.entrypoint,
            target_chain = %item.action.target_chain,
            "Item enqueued"
        );
        QUEUE_TRANSITIONS_TOTAL.with_label_values(&["PENDING"]).inc();
        self.inner.observer.on_item_added(&item);

        Ok(item.id)
    }

    /// Fetch an item by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<QueueItem>> {
        self.inner.store.get(id).await
    }

    /// List all items in `status`
    ///
    /// FAILED items remain listable indefinitely for manual
    /// reconciliation.
    pub async fn list(&self, status: QueueStatus) -> Result<Vec<QueueItem>> {
        self.inner.store.list_by_status(status).await
    }

    /// Run the scheduling loop until `cancel` fires
    ///
    /// Each tick reaps finished workers, then dispatches up to
    /// `max_concurrent - in_flight` due PENDING items. On cancellation
    /// no new items are dispatched and in-flight workers are awaited to
    /// completion, so no item is abandoned mid-execution.
    pub async fn drain(&self, cancel: CancellationToken) {
        info!(
            max_concurrent = self.inner.config.max_concurrent,
            "Retry queue draining"
        );

        let mut tick = tokio::time::interval(Duration::from_millis(
            self.inner.config.tick_interval_ms.max(1),
        ));
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }

            while workers.try_join_next().is_some() {}

            let capacity = self
                .inner
                .config
                .max_concurrent
                .saturating_sub(workers.len());
            if capacity == 0 {
                continue;
            }

            let due = match self.inner.store.due_pending(Utc::now(), capacity).await {
                Ok(due) => due,
                Err(e) => {
                    error!("Failed to select due items: {}", e);
                    continue;
                }
            };

            for mut item in due {
                item.status = QueueStatus::Processing;
                item.attempt += 1;
                if let Err(e) = self.inner.store.update(&item).await {
                    error!(id = %item.id, "Failed to claim item: {}", e);
                    continue;
                }
                QUEUE_TRANSITIONS_TOTAL
                    .with_label_values(&["PROCESSING"])
                    .inc();
                self.inner.observer.on_item_processing(&item);

                let inner = self.inner.clone();
                workers.spawn(async move {
                    QUEUE_INFLIGHT.inc();
                    inner.process_item(item).await;
                    QUEUE_INFLIGHT.dec();
                });
            }
        }

        info!("Retry queue stopping, waiting for in-flight workers");
        while workers.join_next().await.is_some() {}
        info!("Retry queue stopped");
    }
}

impl Inner {
    async fn process_item(&self, mut item: QueueItem) {
        match self.execute(&item).await {
            Ok(receipt) => {
                item.status = QueueStatus::Completed;
                item.last_error = None;
                if let Err(e) = self.store.update(&item).await {
                    error!(id = %item.id, "Failed to record completion: {}", e);
                    return;
                }

                info!(
                    id = %item.id,
                    tx_hash = %receipt.tx_hash,
                    attempt = item.attempt,
                    "Item completed"
                );
                QUEUE_TRANSITIONS_TOTAL
                    .with_label_values(&["COMPLETED"])
                    .inc();
                self.observer.on_item_completed(&item);
            }
            Err(e) => {
                item.last_error = Some(e.to_string());

                let exhausted = item.attempt >= item.max_attempts;
                if exhausted || !e.is_retryable() {
                    item.status = QueueStatus::Failed;
                    if let Err(update_err) = self.store.update(&item).await {
                        error!(id = %item.id, "Failed to record failure: {}", update_err);
                        return;
                    }

                    warn!(
                        id = %item.id,
                        attempt = item.attempt,
                        retryable = e.is_retryable(),
                        "Item failed permanently: {}", e
                    );
                    QUEUE_TRANSITIONS_TOTAL.with_label_values(&["FAILED"]).inc();
                    self.observer.on_item_failed(&item);
                    return;
                }

                // Record the failed attempt, then reschedule with backoff.
                item.status = QueueStatus::Retrying;
                item.visible_at =
                    Utc::now() + retry_delay(self.config.base_retry_delay_secs, item.attempt);
                if let Err(update_err) = self.store.update(&item).await {
                    error!(id = %item.id, "Failed to record retry: {}", update_err);
                    return;
                }
                QUEUE_TRANSITIONS_TOTAL
                    .with_label_values(&["RETRYING"])
                    .inc();
                self.observer.on_item_retry(&item, item.attempt);

                debug!(
                    id = %item.id,
                    attempt = item.attempt,
                    visible_at = %item.visible_at,
                    "Item rescheduled: {}", e
                );

                item.status = QueueStatus::Pending;
                if let Err(update_err) = self.store.update(&item).await {
                    error!(id = %item.id, "Failed to reschedule item: {}", update_err);
                }
            }
        }
    }

    async fn execute(&self, item: &QueueItem) -> Result<ExecutionReceipt> {
        let executor = {
            let executors = self.executors.read().await;
            executors.get(&item.action.target_chain).cloned()
        };

        let executor = executor.ok_or_else(|| {
            Error::Config(format!(
                "no executor registered for {}",
                item.action.target_chain
            ))
        })?;

        executor.execute(&item.action).await
    }
}
