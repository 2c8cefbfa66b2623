//! LendBridge Relay Core
//!
//! Shared types and capability traits for the cross-chain loan relay.
//!
//! # Architecture
//!
//! - **Typed events**: raw chain logs are parsed exactly once, at the
//!   watcher boundary, into a tagged payload union
//! - **Deterministic actions**: every destination-chain call derives a
//!   stable idempotency key from its source event
//! - **Capability traits**: chain RPC, signing and confirmation live
//!   behind `ChainLog` / `ChainCommunicator`, implemented once per chain

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod chain;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use chain::{
    ActionExecutor, ChainCommunicator, ChainLog, EventProcessor, ExecutionReceipt,
    ExecutionStatus, LogPage, LogRecord,
};
pub use checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
pub use config::{ChainConfig, EventSubscription, QueueConfig, RelayConfig, StoreConfig};
pub use error::{Error, Result};
pub use types::{
    Action, ActionArgs, ChainId, Entrypoint, EventKey, EventPayload, LoanFunding,
    LoanLiquidation, LoanRepayment, LoanRequest, RawEvent,
};
