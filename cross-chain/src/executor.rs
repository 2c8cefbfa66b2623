//! Action execution over a chain communicator
//!
//! Adapts the four-operation [`ChainCommunicator`] capability to the
//! queue's [`ActionExecutor`] contract and maps receipt statuses onto
//! the error taxonomy the queue retries on.

use async_trait::async_trait;
use relay_core::types::{Action, ActionArgs};
use relay_core::{
    ActionExecutor, ChainCommunicator, Error, ExecutionReceipt, ExecutionStatus, Result,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Executes actions by dispatching onto a per-chain communicator
pub struct CommunicatorExecutor {
    communicator: Arc<dyn ChainCommunicator>,
}

impl CommunicatorExecutor {
    /// Create an executor bound to one chain's communicator
    pub fn new(communicator: Arc<dyn ChainCommunicator>) -> Self {
        Self { communicator }
    }
}

#[async_trait]
impl ActionExecutor for CommunicatorExecutor {
    async fn execute(&self, action: &Action) -> Result<ExecutionReceipt> {
        // A mis-targeted action can never succeed on this chain; that
        // is the malformed-calldata class, not a transient condition.
        if action.target_chain != self.communicator.chain_id() {
            return Err(Error::Fatal(format!(
                "action {} targets {}, executor is bound to {}",
                action.id,
                action.target_chain,
                self.communicator.chain_id()
            )));
        }

        let receipt = match &action.args {
            ActionArgs::RequestLoan(params) => self.communicator.request_loan(params).await?,
            ActionArgs::FundLoan(params) => self.communicator.fund_loan(params).await?,
            ActionArgs::RepayLoan(params) => self.communicator.repay_loan(params).await?,
            ActionArgs::LiquidateLoan(params) => self.communicator.liquidate_loan(params).await?,
        };

        match receipt.status {
            ExecutionStatus::Confirmed => {
                info!(
                    action = %action.id,
                    entrypoint = %action.entrypoint,
                    tx_hash = %receipt.tx_hash,
                    "Action confirmed"
                );
                Ok(receipt)
            }
            ExecutionStatus::Reverted => {
                warn!(
                    action = %action.id,
                    tx_hash = %receipt.tx_hash,
                    "Action reverted"
                );
                Err(Error::Reverted(format!(
                    "{} reverted in tx {}",
                    action.entrypoint, receipt.tx_hash
                )))
            }
            ExecutionStatus::TimedOut => Err(Error::Timeout(format!(
                "{} not confirmed, tx {}",
                action.entrypoint, receipt.tx_hash
            ))),
        }
    }
}
