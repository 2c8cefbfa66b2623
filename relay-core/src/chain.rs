//! Chain capability traits
//!
//! Concrete RPC clients, wallets and ABI encoding live behind these
//! traits, implemented once per chain. The relay core never depends on
//! a concrete chain type.

use crate::error::Result;
use crate::types::{
    Action, ChainId, LoanFunding, LoanLiquidation, LoanRepayment, LoanRequest, RawEvent,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single log entry as returned by a chain's RPC layer
///
/// Arguments stay untyped here; the watcher parses them into
/// [`crate::types::EventPayload`] before routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Emitting contract
    pub contract_address: String,
    /// Event name
    pub event_name: String,
    /// Transaction hash
    pub tx_hash: String,
    /// Log index within the transaction
    pub log_index: u32,
    /// Block number
    pub block_number: u64,
    /// Raw event arguments
    pub args: serde_json::Value,
}

/// One page of log results
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    /// Records in this page, in non-decreasing block order
    pub records: Vec<LogRecord>,
    /// Continuation token for the next page, if any
    pub next_page: Option<String>,
}

/// Read access to one chain's append-only log
#[async_trait]
pub trait ChainLog: Send + Sync {
    /// Latest height considered final at the configured confirmation depth
    async fn latest_confirmed_height(&self) -> Result<u64>;

    /// Fetch logs matching `signature` in `[from, to]`
    ///
    /// Implementations must honor the chain's native pagination: when
    /// the result does not fit one page, `next_page` carries the
    /// continuation token to pass back in.
    async fn fetch_logs(
        &self,
        from: u64,
        to: u64,
        signature: &str,
        page: Option<String>,
    ) -> Result<LogPage>;

    /// Register interest in an event signature
    async fn subscribe(&self, signature: &str) -> Result<()>;
}

/// Final status of a submitted action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Included and confirmed at the configured depth
    Confirmed,
    /// Included but reverted
    Reverted,
    /// No confirmation within the chain's timeout
    TimedOut,
}

/// Outcome of submitting an action and awaiting confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Transaction hash on the destination chain
    pub tx_hash: String,
    /// Final status
    pub status: ExecutionStatus,
}

/// Loan-protocol operations on one chain
///
/// Exactly the four operations the protocol exposes; submission,
/// signing and the confirmation wait all live behind this boundary.
#[async_trait]
pub trait ChainCommunicator: Send + Sync {
    /// Chain this communicator talks to
    fn chain_id(&self) -> ChainId;

    /// Issue a loan
    async fn request_loan(&self, params: &LoanRequest) -> Result<ExecutionReceipt>;

    /// Mark a loan as funded
    async fn fund_loan(&self, params: &LoanFunding) -> Result<ExecutionReceipt>;

    /// Settle a repayment and release collateral
    async fn repay_loan(&self, params: &LoanRepayment) -> Result<ExecutionReceipt>;

    /// Liquidate collateral
    async fn liquidate_loan(&self, params: &LoanLiquidation) -> Result<ExecutionReceipt>;
}

/// Submits an [`Action`] to its target chain and awaits confirmation
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute the action, returning only once the chain reports a
    /// final status or the confirmation wait times out
    async fn execute(&self, action: &Action) -> Result<ExecutionReceipt>;
}

/// Handles one kind of routed event
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Process a single event
    ///
    /// Errors are isolated per event by the router; returning an error
    /// never halts the watcher or blocks a checkpoint advance.
    async fn process_event(&self, event: &RawEvent) -> Result<()>;
}
