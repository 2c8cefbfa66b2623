//! LendBridge Retry Queue
//!
//! Durable, at-least-once action queue with:
//! - Idempotent enqueue (one active item per idempotency key)
//! - Bounded worker pool draining eligible items
//! - Exponential backoff persisted as `visible_at` deadlines
//! - Terminal failure parking for operator reconciliation
//! - Observer hooks for external logging/metrics
//!
//! ## Lifecycle
//!
//! ```text
//! PENDING ──> PROCESSING ──> COMPLETED
//!    ▲            │
//!    │            ├──> RETRYING ──> PENDING (after backoff)
//!    │            │
//!    └────────────└──> FAILED (terminal, attempts exhausted or fatal)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod item;
pub mod metrics;
pub mod observer;
pub mod queue;
pub mod storage;

pub use item::{QueueItem, QueueStatus};
pub use observer::{LogObserver, NoopObserver, QueueObserver};
pub use queue::{retry_delay, RetryQueue};
pub use storage::{InMemoryQueueStore, QueueStore};

/// Default attempts before an item parks in FAILED
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base retry delay (seconds)
pub const DEFAULT_BASE_RETRY_DELAY_SECS: u64 = 5;

/// Default worker pool size
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Backoff doubling is capped at this many shifts
pub const BACKOFF_SHIFT_CAP: u32 = 6;
