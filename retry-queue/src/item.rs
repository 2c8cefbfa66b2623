//! Queue item and status lifecycle

use chrono::{DateTime, Utc};
use relay_core::types::Action;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Eligible for dispatch once `visible_at` passes
    Pending,
    /// Owned by a worker
    Processing,
    /// Executed and confirmed (terminal)
    Completed,
    /// Failed an attempt, backoff being applied
    Retrying,
    /// Attempts exhausted or fatal error (terminal)
    Failed,
}

impl QueueStatus {
    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::Processing => "PROCESSING",
            QueueStatus::Completed => "COMPLETED",
            QueueStatus::Retrying => "RETRYING",
            QueueStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One queued action with its delivery state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Item ID
    pub id: Uuid,
    /// The action to execute
    pub action: Action,
    /// Current status
    pub status: QueueStatus,
    /// Execution attempts made so far
    pub attempt: u32,
    /// Attempts before the item parks in FAILED
    pub max_attempts: u32,
    /// Message of the most recent failure
    pub last_error: Option<String>,
    /// Enqueue time
    pub enqueued_at: DateTime<Utc>,
    /// Earliest time the scheduler may dispatch this item
    pub visible_at: DateTime<Utc>,
}

impl QueueItem {
    /// New PENDING item, immediately visible
    pub fn new(action: Action, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            action,
            status: QueueStatus::Pending,
            attempt: 0,
            max_attempts,
            last_error: None,
            enqueued_at: now,
            visible_at: now,
        }
    }

    /// Whether the item still occupies its idempotency key
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
