//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `checkpoints` - Per-chain polling cursors (key: chain_id)
//! - `queue` - Queue items (key: item_id)
//! - `queue_index` - Secondary indices: status and active idempotency key

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::checkpoint::{Checkpoint, CheckpointStore};
use relay_core::config::StoreConfig;
use relay_core::types::ChainId;
use relay_core::{Error, Result};
use retry_queue::{QueueItem, QueueStatus, QueueStore};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_CHECKPOINTS: &str = "checkpoints";
const CF_QUEUE: &str = "queue";
const CF_QUEUE_INDEX: &str = "queue_index";

/// Index key prefixes within `queue_index`
const IDX_STATUS: u8 = b's';
const IDX_KEY: u8 = b'k';

/// Durable relay storage over RocksDB
pub struct RelayStore {
    db: Arc<DB>,
}

impl RelayStore {
    /// Open or create the database
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)
            .map_err(|e| Error::Storage(format!("failed to create data dir: {}", e)))?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CHECKPOINTS, Self::cf_options_checkpoints()),
            ColumnFamilyDescriptor::new(CF_QUEUE, Self::cf_options_queue()),
            ColumnFamilyDescriptor::new(CF_QUEUE_INDEX, Self::cf_options_index()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)
            .map_err(|e| Error::Storage(e.to_string()))?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_checkpoints() -> Options {
        // A handful of tiny rows, rewritten every poll cycle
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_queue() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_index() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    // Index key helpers

    fn checkpoint_key(chain_id: ChainId) -> [u8; 8] {
        chain_id.0.to_be_bytes()
    }

    fn status_code(status: QueueStatus) -> u8 {
        match status {
            QueueStatus::Pending => 0,
            QueueStatus::Processing => 1,
            QueueStatus::Completed => 2,
            QueueStatus::Retrying => 3,
            QueueStatus::Failed => 4,
        }
    }

    fn status_index_key(status: QueueStatus, id: Uuid) -> Vec<u8> {
        let mut key = vec![IDX_STATUS, Self::status_code(status)];
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn status_index_prefix(status: QueueStatus) -> [u8; 2] {
        [IDX_STATUS, Self::status_code(status)]
    }

    fn key_index_key(idempotency_key: &str) -> Vec<u8> {
        let mut key = vec![IDX_KEY];
        key.extend_from_slice(idempotency_key.as_bytes());
        key
    }

    /// Write `item`, moving its index entries from `previous` state
    ///
    /// All mutations land in one atomic batch so a crash never leaves
    /// an item disagreeing with its indices.
    fn write_item(&self, item: &QueueItem, previous: Option<&QueueItem>) -> Result<()> {
        let cf_queue = self.cf_handle(CF_QUEUE)?;
        let cf_index = self.cf_handle(CF_QUEUE_INDEX)?;

        let value = bincode::serialize(item).map_err(|e| Error::Serialization(e.to_string()))?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_queue, item.id.as_bytes(), &value);

        if let Some(previous) = previous {
            if previous.status != item.status {
                batch.delete_cf(cf_index, Self::status_index_key(previous.status, previous.id));
            }
        }
        batch.put_cf(cf_index, Self::status_index_key(item.status, item.id), []);

        let key_idx = Self::key_index_key(&item.action.idempotency_key);
        if item.is_active() {
            batch.put_cf(cf_index, &key_idx, item.id.as_bytes());
        } else {
            batch.delete_cf(cf_index, &key_idx);
        }

        self.db
            .write(batch)
            .map_err(|e| Error::Storage(e.to_string()))
    }

    fn get_item(&self, id: Uuid) -> Result<Option<QueueItem>> {
        let cf = self.cf_handle(CF_QUEUE)?;
        let value = self
            .db
            .get_cf(cf, id.as_bytes())
            .map_err(|e| Error::Storage(e.to_string()))?;

        match value {
            Some(bytes) => {
                let item = bincode::deserialize(&bytes)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn items_in_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>> {
        let cf_index = self.cf_handle(CF_QUEUE_INDEX)?;
        let prefix = Self::status_index_prefix(status);

        let mut items = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf_index, IteratorMode::From(&prefix, rocksdb::Direction::Forward));

        for entry in iter {
            let (key, _) = entry.map_err(|e| Error::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() != 2 + 16 {
                continue;
            }

            let id_bytes: [u8; 16] = key[2..18]
                .try_into()
                .map_err(|_| Error::Storage("malformed status index key".to_string()))?;
            let id = Uuid::from_bytes(id_bytes);

            if let Some(item) = self.get_item(id)? {
                items.push(item);
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl CheckpointStore for RelayStore {
    async fn load(&self, chain_id: ChainId) -> Result<Option<Checkpoint>> {
        let cf = self.cf_handle(CF_CHECKPOINTS)?;
        let value = self
            .db
            .get_cf(cf, Self::checkpoint_key(chain_id))
            .map_err(|e| Error::Storage(e.to_string()))?;

        match value {
            Some(bytes) => {
                let checkpoint = bincode::deserialize(&bytes)
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                Ok(Some(checkpoint))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let cf = self.cf_handle(CF_CHECKPOINTS)?;
        let value =
            bincode::serialize(checkpoint).map_err(|e| Error::Serialization(e.to_string()))?;

        self.db
            .put_cf(cf, Self::checkpoint_key(checkpoint.chain_id), &value)
            .map_err(|e| Error::Storage(e.to_string()))?;

        tracing::debug!(
            chain = %checkpoint.chain_id,
            block = checkpoint.last_processed_block,
            "Checkpoint saved"
        );

        Ok(())
    }
}

#[async_trait]
impl QueueStore for RelayStore {
    async fn insert(&self, item: &QueueItem) -> Result<()> {
        self.write_item(item, None)
    }

    async fn get(&self, id: Uuid) -> Result<Option<QueueItem>> {
        self.get_item(id)
    }

    async fn update(&self, item: &QueueItem) -> Result<()> {
        let previous = self.get_item(item.id)?;
        self.write_item(item, previous.as_ref())
    }

    async fn find_active(&self, idempotency_key: &str) -> Result<Option<QueueItem>> {
        let cf_index = self.cf_handle(CF_QUEUE_INDEX)?;
        let value = self
            .db
            .get_cf(cf_index, Self::key_index_key(idempotency_key))
            .map_err(|e| Error::Storage(e.to_string()))?;

        let Some(bytes) = value else {
            return Ok(None);
        };
        let id_bytes: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::Storage("malformed key index value".to_string()))?;

        // Guard against a stale index entry: only active items hold a key.
        match self.get_item(Uuid::from_bytes(id_bytes))? {
            Some(item) if item.is_active() => Ok(Some(item)),
            _ => Ok(None),
        }
    }

    async fn due_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<QueueItem>> {
        let mut due = self.items_in_status(QueueStatus::Pending)?;
        due.retain(|item| item.visible_at <= now);
        due.sort_by_key(|item| item.visible_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueItem>> {
        self.items_in_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::{Action, ActionArgs, EventKey, LoanFunding, LoanRepayment};
    use tempfile::TempDir;

    fn test_store() -> (RelayStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        (RelayStore::open(&config).unwrap(), temp_dir)
    }

    fn test_item(tx: &str) -> QueueItem {
        let action = Action::new(
            EventKey {
                chain_id: ChainId(1),
                tx_hash: tx.to_string(),
                log_index: 0,
            },
            ChainId(2),
            ActionArgs::FundLoan(LoanFunding {
                borrower: "0xABC".to_string(),
            }),
        );
        QueueItem::new(action, 3)
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let (store, _temp) = test_store();

        assert!(store.load(ChainId(1)).await.unwrap().is_none());

        let mut checkpoint = Checkpoint::new(ChainId(1), 1000);
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load(ChainId(1)).await.unwrap().unwrap();
        assert_eq!(loaded.last_processed_block, 1000);
        assert!(loaded.continuation_token.is_none());

        checkpoint.advance(1042);
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load(ChainId(1)).await.unwrap().unwrap();
        assert_eq!(loaded.last_processed_block, 1042);
    }

    #[tokio::test]
    async fn test_checkpoint_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };

        {
            let store = RelayStore::open(&config).unwrap();
            store
                .save(&Checkpoint::new(ChainId(7), 555))
                .await
                .unwrap();
        }

        let store = RelayStore::open(&config).unwrap();
        let loaded = store.load(ChainId(7)).await.unwrap().unwrap();
        assert_eq!(loaded.last_processed_block, 555);
    }

    #[tokio::test]
    async fn test_queue_item_round_trip_with_typed_args() {
        let (store, _temp) = test_store();

        let action = Action::new(
            EventKey {
                chain_id: ChainId(1),
                tx_hash: "0xaa".to_string(),
                log_index: 4,
            },
            ChainId(2),
            ActionArgs::RepayLoan(LoanRepayment {
                borrower: "0xABC".to_string(),
                amount: u128::MAX,
            }),
        );
        let item = QueueItem::new(action, 3);

        store.insert(&item).await.unwrap();
        let loaded = store.get(item.id).await.unwrap().unwrap();

        assert_eq!(loaded.action.idempotency_key, item.action.idempotency_key);
        match loaded.action.args {
            ActionArgs::RepayLoan(ref repayment) => assert_eq!(repayment.amount, u128::MAX),
            ref other => panic!("wrong args variant: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_index_moves_with_updates() {
        let (store, _temp) = test_store();
        let mut item = test_item("0xaa");

        store.insert(&item).await.unwrap();
        assert_eq!(store.list_by_status(QueueStatus::Pending).await.unwrap().len(), 1);

        item.status = QueueStatus::Processing;
        store.update(&item).await.unwrap();
        assert!(store.list_by_status(QueueStatus::Pending).await.unwrap().is_empty());
        assert_eq!(
            store
                .list_by_status(QueueStatus::Processing)
                .await
                .unwrap()
                .len(),
            1
        );

        item.status = QueueStatus::Failed;
        store.update(&item).await.unwrap();
        assert_eq!(store.list_by_status(QueueStatus::Failed).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_active_released_on_terminal() {
        let (store, _temp) = test_store();
        let mut item = test_item("0xaa");
        let key = item.action.idempotency_key.clone();

        store.insert(&item).await.unwrap();
        assert!(store.find_active(&key).await.unwrap().is_some());

        item.status = QueueStatus::Completed;
        store.update(&item).await.unwrap();
        assert!(store.find_active(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_due_pending_filters_and_orders() {
        let (store, _temp) = test_store();
        let now = Utc::now();

        let mut early = test_item("0xaa");
        early.visible_at = now - chrono::Duration::seconds(20);
        let mut late = test_item("0xbb");
        late.visible_at = now - chrono::Duration::seconds(5);
        let mut hidden = test_item("0xcc");
        hidden.visible_at = now + chrono::Duration::seconds(60);

        store.insert(&late).await.unwrap();
        store.insert(&early).await.unwrap();
        store.insert(&hidden).await.unwrap();

        let due = store.due_pending(now, 10).await.unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, early.id);
        assert_eq!(due[1].id, late.id);
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig {
            data_dir: temp_dir.path().to_path_buf(),
        };
        let item = test_item("0xaa");

        {
            let store = RelayStore::open(&config).unwrap();
            store.insert(&item).await.unwrap();
        }

        let store = RelayStore::open(&config).unwrap();
        let loaded = store.get(item.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, QueueStatus::Pending);
        assert_eq!(store.list_by_status(QueueStatus::Pending).await.unwrap().len(), 1);
    }
}
