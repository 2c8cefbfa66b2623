//! Configuration for the relay

use crate::error::{Error, Result};
use crate::types::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Monitored chains
    pub chains: Vec<ChainConfig>,

    /// Retry queue configuration
    pub queue: QueueConfig,

    /// Storage configuration
    pub store: StoreConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chains: Vec::new(),
            queue: QueueConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// One monitored chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain identifier
    pub chain_id: ChainId,

    /// Human-readable chain name
    pub name: String,

    /// RPC endpoint
    pub rpc_url: String,

    /// Monitored protocol contract
    pub contract_address: String,

    /// First block to scan when no checkpoint exists
    pub start_block: Option<u64>,

    /// Seconds between poll cycles
    pub poll_interval_secs: u64,

    /// Blocks behind the tip considered final
    pub confirmation_depth: u64,

    /// Initial backoff after a transient fetch error (milliseconds)
    pub error_backoff_initial_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub error_backoff_max_ms: u64,

    /// Event signatures this chain's watcher subscribes to
    pub events: Vec<EventSubscription>,
}

impl ChainConfig {
    /// Minimal config for `chain_id` with default intervals
    pub fn new(chain_id: ChainId, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            rpc_url: String::new(),
            contract_address: String::new(),
            start_block: None,
            poll_interval_secs: 5,
            confirmation_depth: 6,
            error_backoff_initial_ms: 10_000,
            error_backoff_max_ms: 300_000,
            events: Vec::new(),
        }
    }

    /// Validate this chain's settings
    ///
    /// A failure here prevents the chain's watcher and executor from
    /// starting; other chains are unaffected.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(Error::Config(format!("{}: missing rpc_url", self.name)));
        }
        if self.contract_address.is_empty() {
            return Err(Error::Config(format!(
                "{}: missing contract_address",
                self.name
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config(format!(
                "{}: poll_interval_secs must be positive",
                self.name
            )));
        }
        Ok(())
    }
}

/// A subscribed event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSubscription {
    /// Event name used for routing (e.g. `LoanRequested`)
    pub event_name: String,
    /// Chain-native signature or selector hash
    pub signature: String,
}

/// Retry queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Attempts before an item parks in FAILED
    pub max_attempts: u32,

    /// Base delay before the first retry (seconds)
    pub base_retry_delay_secs: u64,

    /// Worker pool size
    pub max_concurrent: usize,

    /// Scheduler tick interval (milliseconds)
    pub tick_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_retry_delay_secs: 5,
            max_concurrent: 5,
            tick_interval_ms: 1_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/relay"),
        }
    }
}

impl RelayConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config: {}", e)))?;
        let config: RelayConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(data_dir) = std::env::var("RELAY_DATA_DIR") {
            self.store.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(value) = std::env::var("RELAY_MAX_ATTEMPTS") {
            if let Ok(parsed) = value.parse() {
                self.queue.max_attempts = parsed;
            }
        }

        if let Ok(value) = std::env::var("RELAY_MAX_CONCURRENT") {
            if let Ok(parsed) = value.parse() {
                self.queue.max_concurrent = parsed;
            }
        }
    }

    /// Validate the whole configuration at startup
    pub fn validate(&self) -> Result<()> {
        if self.chains.is_empty() {
            return Err(Error::Config("no chains configured".to_string()));
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                return Err(Error::Config(format!(
                    "duplicate chain id: {}",
                    chain.chain_id
                )));
            }
            chain.validate()?;
        }

        if self.queue.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be positive".to_string()));
        }
        if self.queue.max_concurrent == 0 {
            return Err(Error::Config("max_concurrent must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_chain(id: u64) -> ChainConfig {
        let mut chain = ChainConfig::new(ChainId(id), format!("test-{}", id));
        chain.rpc_url = "http://localhost:8545".to_string();
        chain.contract_address = "0xC0FFEE".to_string();
        chain
    }

    #[test]
    fn test_queue_defaults() {
        let queue = QueueConfig::default();
        assert_eq!(queue.max_attempts, 3);
        assert_eq!(queue.base_retry_delay_secs, 5);
        assert_eq!(queue.max_concurrent, 5);
    }

    #[test]
    fn test_validate_rejects_missing_contract() {
        let mut config = RelayConfig::default();
        let mut chain = valid_chain(1);
        chain.contract_address = String::new();
        config.chains.push(chain);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_validate_rejects_duplicate_chain_ids() {
        let mut config = RelayConfig::default();
        config.chains.push(valid_chain(7));
        config.chains.push(valid_chain(7));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_two_chains() {
        let mut config = RelayConfig::default();
        config.chains.push(valid_chain(11));
        config.chains.push(valid_chain(22));

        assert!(config.validate().is_ok());
    }
}
