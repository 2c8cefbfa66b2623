//! Durable per-chain polling cursors
//!
//! One checkpoint row per chain, mutated only by its owning watcher,
//! and only after a batch of events has been fully handed to the
//! router. Re-delivery after a crash is bounded to one poll cycle.

use crate::error::Result;
use crate::types::ChainId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Last fully-processed position on one chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Chain this cursor belongs to
    pub chain_id: ChainId,
    /// Last block whose events were fully handed off
    pub last_processed_block: u64,
    /// Resume hint for sources whose pagination outlives a poll cycle;
    /// `None` after a fully drained cycle
    pub continuation_token: Option<String>,
    /// Last save time
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint at `block`
    pub fn new(chain_id: ChainId, block: u64) -> Self {
        Self {
            chain_id,
            last_processed_block: block,
            continuation_token: None,
            updated_at: Utc::now(),
        }
    }

    /// Advance to `block`, clearing any continuation token
    ///
    /// The cursor is monotonic: an advance to a lower block is ignored
    /// and reported as `false`.
    pub fn advance(&mut self, block: u64) -> bool {
        if block < self.last_processed_block {
            return false;
        }
        self.last_processed_block = block;
        self.continuation_token = None;
        self.updated_at = Utc::now();
        true
    }
}

/// Crash-durable checkpoint persistence
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for `chain_id`, if one was ever saved
    async fn load(&self, chain_id: ChainId) -> Result<Option<Checkpoint>>;

    /// Persist `checkpoint`, replacing the chain's previous row
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;
}

/// In-memory checkpoint store, for tests
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    rows: RwLock<HashMap<ChainId, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, chain_id: ChainId) -> Result<Option<Checkpoint>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&chain_id).cloned())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert(checkpoint.chain_id, checkpoint.clone());
        Ok(())
    }
}
