//! LendBridge Relay Store
//!
//! Durable storage for the relay, backed by a single RocksDB database.
//! One store serves both persistence concerns:
//!
//! - Checkpoint rows (one per chain) for the watchers
//! - Queue items plus their status and idempotency-key indices for the
//!   retry queue
//!
//! The in-memory implementations in `relay-core` and `retry-queue`
//! mirror the same traits for tests; this crate is the one that
//! survives a process restart.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod storage;

pub use storage::RelayStore;
