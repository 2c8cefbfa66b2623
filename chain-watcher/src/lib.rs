//! LendBridge Chain Watcher
//!
//! One watcher per monitored chain turns that chain's append-only log
//! into a reliable sequence of typed events:
//!
//! - Polls for new confirmed blocks at a fixed interval
//! - Drains all log pages for every subscribed signature before
//!   advancing its checkpoint
//! - Routes events before the checkpoint moves, bounding re-delivery
//!   after a crash to one poll cycle
//! - Backs off exponentially (jittered, capped) on transient RPC errors
//!
//! Watchers for different chains are fully independent; no ordering is
//! guaranteed between chains.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod metrics;
pub mod router;
pub mod watcher;

pub use router::{EventRouter, RouteOutcome};
pub use watcher::ChainWatcher;
