//! LendBridge Cross-Chain Layer
//!
//! Pure translation from observed loan events to destination-chain
//! actions, plus the adapters that wire it into the router and the
//! retry queue:
//!
//! - [`CrossChainManager`] builds exactly one action per event and
//!   enqueues it; it knows nothing about retries or chain RPC
//! - One [`relay_core::EventProcessor`] per loan event kind delegates
//!   to the manager
//! - [`CommunicatorExecutor`] dispatches a queued action onto the
//!   target chain's [`relay_core::ChainCommunicator`]

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod executor;
pub mod manager;
pub mod processors;

pub use executor::CommunicatorExecutor;
pub use manager::CrossChainManager;
pub use processors::{
    register_loan_processors, LoanFundedProcessor, LoanLiquidatedProcessor,
    LoanRepaidProcessor, LoanRequestedProcessor,
};
