//! Queue persistence interface

use crate::item::{QueueItem, QueueStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Queue item persistence
///
/// Implementations guarantee atomic read-modify-write on a single item;
/// the queue itself guarantees that no two workers ever own the same
/// item, so no cross-item locking is required.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new item
    async fn insert(&self, item: &QueueItem) -> Result<()>;

    /// Fetch an item by ID
    async fn get(&self, id: Uuid) -> Result<Option<QueueItem>>;

    /// Replace an item's stored state
    async fn update(&self, item: &QueueItem) -> Result<()>;

    /// Find the non-terminal item holding `idempotency_key`, if any
    async fn find_active(&self, idempotency_key: &str) -> Result<Option<QueueItem>>;

    /// PENDING items with `visible_at <= now`, earliest-visible first,
    /// at most `limit`
    async fn due_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueItem>>;

    /// All items in `status`
    async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>>;
}

/// In-memory queue store, for tests
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    items: RwLock<HashMap<Uuid, QueueItem>>,
}

impl InMemoryQueueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn insert(&self, item: &QueueItem) -> Result<()> {
        let mut items = self.items.write().await;
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueueItem>> {
        let items = self.items.read().await;
        Ok(items.get(&id).cloned())
    }

    async fn update(&self, item: &QueueItem) -> Result<()> {
        let mut items = self.items.write().await;
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn find_active(&self, idempotency_key: &str) -> Result<Option<QueueItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .find(|item| item.is_active() && item.action.idempotency_key == idempotency_key)
            .cloned())
    }

    async fn due_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueItem>> {
        let items = self.items.read().await;
        let mut due: Vec<QueueItem> = items
            .values()
            .filter(|item| item.status == QueueStatus::Pending && item.visible_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|item| item.visible_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>> {
        let items = self.items.read().await;
        Ok(items
            .values()
            .filter(|item| item.status == status)
            .cloned()
            .collect())
    }
}
