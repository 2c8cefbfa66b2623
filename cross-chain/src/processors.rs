//! Loan event processors
//!
//! Thin adapters from the router's [`EventProcessor`] contract onto the
//! manager's translation methods, one per event kind.

use crate::manager::CrossChainManager;
use async_trait::async_trait;
use chain_watcher::EventRouter;
use relay_core::types::{ChainId, RawEvent};
use relay_core::{EventProcessor, Result};
use std::sync::Arc;

/// Handles `LoanRequested` events from the origin chain
pub struct LoanRequestedProcessor {
    manager: Arc<CrossChainManager>,
}

impl LoanRequestedProcessor {
    /// Create a processor delegating to `manager`
    pub fn new(manager: Arc<CrossChainManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventProcessor for LoanRequestedProcessor {
    async fn process_event(&self, event: &RawEvent) -> Result<()> {
        self.manager.on_loan_requested(event).await.map(|_| ())
    }
}

/// Handles `LoanFunded` events from the origin chain
pub struct LoanFundedProcessor {
    manager: Arc<CrossChainManager>,
}

impl LoanFundedProcessor {
    /// Create a processor delegating to `manager`
    pub fn new(manager: Arc<CrossChainManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventProcessor for LoanFundedProcessor {
    async fn process_event(&self, event: &RawEvent) -> Result<()> {
        self.manager.on_loan_funded(event).await.map(|_| ())
    }
}

/// Handles `LoanRepaid` events from the loan chain
pub struct LoanRepaidProcessor {
    manager: Arc<CrossChainManager>,
}

impl LoanRepaidProcessor {
    /// Create a processor delegating to `manager`
    pub fn new(manager: Arc<CrossChainManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventProcessor for LoanRepaidProcessor {
    async fn process_event(&self, event: &RawEvent) -> Result<()> {
        self.manager.on_loan_repaid(event).await.map(|_| ())
    }
}

/// Handles `LoanLiquidated` events from the loan chain
pub struct LoanLiquidatedProcessor {
    manager: Arc<CrossChainManager>,
}

impl LoanLiquidatedProcessor {
    /// Create a processor delegating to `manager`
    pub fn new(manager: Arc<CrossChainManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl EventProcessor for LoanLiquidatedProcessor {
    async fn process_event(&self, event: &RawEvent) -> Result<()> {
        self.manager.on_loan_liquidated(event).await.map(|_| ())
    }
}

/// Register all four loan processors on `router`
///
/// Origin-chain events flow toward the loan chain and vice versa,
/// matching the manager's translation directions.
pub fn register_loan_processors(
    router: &mut EventRouter,
    manager: Arc<CrossChainManager>,
    origin_chain: ChainId,
    loan_chain: ChainId,
) {
    router.register(
        origin_chain,
        "LoanRequested",
        Arc::new(LoanRequestedProcessor::new(manager.clone())),
    );
    router.register(
        origin_chain,
        "LoanFunded",
        Arc::new(LoanFundedProcessor::new(manager.clone())),
    );
    router.register(
        loan_chain,
        "LoanRepaid",
        Arc::new(LoanRepaidProcessor::new(manager.clone())),
    );
    router.register(
        loan_chain,
        "LoanLiquidated",
        Arc::new(LoanLiquidatedProcessor::new(manager)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::config::QueueConfig;
    use retry_queue::{InMemoryQueueStore, RetryQueue};

    #[test]
    fn test_register_wires_all_four_routes() {
        let queue = RetryQueue::new(
            Arc::new(InMemoryQueueStore::new()),
            QueueConfig::default(),
        );
        let manager = Arc::new(CrossChainManager::new(ChainId(11), ChainId(22), queue));

        let mut router = EventRouter::new();
        register_loan_processors(&mut router, manager, ChainId(11), ChainId(22));

        assert_eq!(router.len(), 4);
    }
}
