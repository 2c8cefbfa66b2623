//! Per-chain polling loop
//!
//! Invariant: events are handed to the router before the checkpoint
//! advances, and the checkpoint only advances to a height once every
//! page of every subscribed signature in the range has been drained.

use crate::metrics::{WATCHER_LAST_PROCESSED_BLOCK, WATCHER_POLL_ERRORS_TOTAL};
use crate::router::EventRouter;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use relay_core::checkpoint::{Checkpoint, CheckpointStore};
use relay_core::config::ChainConfig;
use relay_core::types::{EventPayload, RawEvent};
use relay_core::{ChainLog, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one poll cycle
enum PollOutcome {
    /// No new confirmed blocks
    Idle,
    /// Checkpoint advanced to `to` after routing `routed` events
    Advanced { to: u64, routed: usize },
}

/// Watches one chain's log and feeds the router
pub struct ChainWatcher {
    config: ChainConfig,
    log: Arc<dyn ChainLog>,
    router: Arc<EventRouter>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl ChainWatcher {
    /// Create a watcher for `config`'s chain
    pub fn new(
        config: ChainConfig,
        log: Arc<dyn ChainLog>,
        router: Arc<EventRouter>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config,
            log,
            router,
            checkpoints,
        }
    }

    /// Run the polling loop until `cancel` fires
    ///
    /// Transient chain errors back off and retry the same range; they
    /// never advance the checkpoint and never end the loop. On
    /// cancellation the in-flight cycle finishes, the checkpoint is
    /// persisted, and the loop exits.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.subscribe_all(&cancel).await;
        if cancel.is_cancelled() {
            return Ok(());
        }

        let mut checkpoint = self.load_or_init_checkpoint().await?;
        info!(
            chain = %self.config.chain_id,
            name = %self.config.name,
            from_block = checkpoint.last_processed_block,
            "Watcher started"
        );

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut error_backoff = self.new_backoff();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let sleep = match self.poll_once(&mut checkpoint).await {
                Ok(PollOutcome::Idle) => {
                    debug!(chain = %self.config.chain_id, "No new confirmed blocks");
                    error_backoff.reset();
                    poll_interval
                }
                Ok(PollOutcome::Advanced { to, routed }) => {
                    info!(
                        chain = %self.config.chain_id,
                        to_block = to,
                        routed,
                        "Poll cycle complete"
                    );
                    error_backoff.reset();
                    poll_interval
                }
                Err(e) => {
                    WATCHER_POLL_ERRORS_TOTAL
                        .with_label_values(&[&self.config.chain_id.to_string()])
                        .inc();
                    let delay = error_backoff
                        .next_backoff()
                        .unwrap_or(Duration::from_millis(self.config.error_backoff_max_ms));
                    warn!(
                        chain = %self.config.chain_id,
                        retry_in_ms = delay.as_millis() as u64,
                        "Poll cycle failed: {}", e
                    );
                    delay
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(sleep) => {}
            }
        }

        // Persist the cursor one last time so a restart resumes exactly
        // where this run stopped.
        if let Err(e) = self.checkpoints.save(&checkpoint).await {
            warn!(chain = %self.config.chain_id, "Failed to persist checkpoint on shutdown: {}", e);
        }
        info!(chain = %self.config.chain_id, "Watcher stopped");

        Ok(())
    }

    /// Register every configured signature, retrying transient failures
    async fn subscribe_all(&self, cancel: &CancellationToken) {
        let mut backoff = self.new_backoff();

        for subscription in &self.config.events {
            loop {
                if cancel.is_cancelled() {
                    return;
                }
                match self.log.subscribe(&subscription.signature).await {
                    Ok(()) => {
                        debug!(
                            chain = %self.config.chain_id,
                            event_name = %subscription.event_name,
                            "Subscribed"
                        );
                        backoff.reset();
                        break;
                    }
                    Err(e) => {
                        let delay = backoff
                            .next_backoff()
                            .unwrap_or(Duration::from_millis(self.config.error_backoff_max_ms));
                        warn!(
                            chain = %self.config.chain_id,
                            event_name = %subscription.event_name,
                            "Subscribe failed, retrying: {}", e
                        );
                        tokio::select! {
                            _ = cancel.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    async fn load_or_init_checkpoint(&self) -> Result<Checkpoint> {
        match self.checkpoints.load(self.config.chain_id).await? {
            Some(checkpoint) => Ok(checkpoint),
            None => Ok(Checkpoint::new(
                self.config.chain_id,
                self.config.start_block.unwrap_or(0),
            )),
        }
    }

    /// One poll cycle: fetch, parse, route, then advance
    async fn poll_once(&self, checkpoint: &mut Checkpoint) -> Result<PollOutcome> {
        let latest = self.log.latest_confirmed_height().await?;
        if latest <= checkpoint.last_processed_block {
            return Ok(PollOutcome::Idle);
        }

        let from = checkpoint.last_processed_block + 1;
        let mut routed = 0usize;

        // Resume hint from a previously persisted mid-range cursor; it
        // applies to the first fetch of the cycle only.
        let mut page_token = checkpoint.continuation_token.take();

        for subscription in &self.config.events {
            loop {
                let page = self
                    .log
                    .fetch_logs(from, latest, &subscription.signature, page_token.take())
                    .await?;

                for record in page.records {
                    let payload =
                        match EventPayload::parse(&subscription.event_name, &record.args) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!(
                                    chain = %self.config.chain_id,
                                    event_name = %subscription.event_name,
                                    tx_hash = %record.tx_hash,
                                    "Skipping malformed event: {}", e
                                );
                                continue;
                            }
                        };

                    let event = RawEvent {
                        chain_id: self.config.chain_id,
                        contract_address: record.contract_address,
                        event_name: subscription.event_name.clone(),
                        tx_hash: record.tx_hash,
                        log_index: record.log_index,
                        block_number: record.block_number,
                        payload,
                    };

                    // Processor outcomes are isolated inside the router;
                    // the cycle keeps going regardless.
                    self.router.route(&event).await;
                    routed += 1;
                }

                match page.next_page {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        }

        // Every page of every signature is drained; only now may the
        // cursor move.
        checkpoint.advance(latest);
        self.checkpoints.save(checkpoint).await?;
        WATCHER_LAST_PROCESSED_BLOCK
            .with_label_values(&[&self.config.chain_id.to_string()])
            .set(latest as i64);

        Ok(PollOutcome::Advanced { to: latest, routed })
    }

    fn new_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.error_backoff_initial_ms))
            .with_max_interval(Duration::from_millis(self.config.error_backoff_max_ms))
            .with_max_elapsed_time(None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::checkpoint::InMemoryCheckpointStore;
    use relay_core::config::EventSubscription;
    use relay_core::types::ChainId;
    use relay_core::{Error, EventProcessor, LogPage, LogRecord};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn test_config(chain: u64) -> ChainConfig {
        let mut config = ChainConfig::new(ChainId(chain), format!("test-{}", chain));
        config.rpc_url = "http://localhost:8545".to_string();
        config.contract_address = "0xC0FFEE".to_string();
        config.poll_interval_secs = 1;
        config.error_backoff_initial_ms = 5;
        config.error_backoff_max_ms = 20;
        config.events.push(EventSubscription {
            event_name: "LoanFunded".to_string(),
            signature: "LoanFunded(string)".to_string(),
        });
        config
    }

    fn funded_record(tx: &str, block: u64) -> LogRecord {
        LogRecord {
            contract_address: "0xC0FFEE".to_string(),
            event_name: "LoanFunded".to_string(),
            tx_hash: tx.to_string(),
            log_index: 0,
            block_number: block,
            args: json!({ "user": "0xABC" }),
        }
    }

    /// Scripted chain log: fixed height, records by page, optional
    /// injected height failures
    struct ScriptedLog {
        height: AtomicU32,
        pages: Mutex<HashMap<Option<String>, LogPage>>,
        height_failures: AtomicU32,
        fetch_calls: AtomicU32,
    }

    impl ScriptedLog {
        fn new(height: u32) -> Self {
            let mut pages = HashMap::new();
            pages.insert(None, LogPage::default());
            Self {
                height: AtomicU32::new(height),
                pages: Mutex::new(pages),
                height_failures: AtomicU32::new(0),
                fetch_calls: AtomicU32::new(0),
            }
        }

        fn set_page(&self, token: Option<&str>, page: LogPage) {
            self.pages
                .lock()
                .unwrap()
                .insert(token.map(String::from), page);
        }

        fn fail_next_height_calls(&self, count: u32) {
            self.height_failures.store(count, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainLog for ScriptedLog {
        async fn latest_confirmed_height(&self) -> Result<u64> {
            let remaining = self.height_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.height_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(Error::Transient("rpc timeout".to_string()));
            }
            Ok(self.height.load(Ordering::SeqCst) as u64)
        }

        async fn fetch_logs(
            &self,
            _from: u64,
            _to: u64,
            _signature: &str,
            page: Option<String>,
        ) -> Result<LogPage> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            let pages = self.pages.lock().unwrap();
            Ok(pages.get(&page).cloned().unwrap_or_default())
        }

        async fn subscribe(&self, _signature: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Records routed tx hashes in arrival order
    #[derive(Default)]
    struct RecordingProcessor {
        seen: Mutex<Vec<(String, u64)>>,
    }

    #[async_trait]
    impl EventProcessor for RecordingProcessor {
        async fn process_event(&self, event: &RawEvent) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((event.tx_hash.clone(), event.block_number));
            Ok(())
        }
    }

    fn build_watcher(
        config: ChainConfig,
        log: Arc<ScriptedLog>,
    ) -> (ChainWatcher, Arc<RecordingProcessor>, Arc<InMemoryCheckpointStore>) {
        let processor = Arc::new(RecordingProcessor::default());
        let mut router = EventRouter::new();
        router.register(config.chain_id, "LoanFunded", processor.clone());

        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        let watcher = ChainWatcher::new(config, log, Arc::new(router), checkpoints.clone());
        (watcher, processor, checkpoints)
    }

    async fn run_briefly(watcher: &ChainWatcher, millis: u64) {
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            canceller.cancel();
        });
        watcher.run(cancel).await.unwrap();
    }

    #[tokio::test]
    async fn test_routes_then_advances_checkpoint() {
        let log = Arc::new(ScriptedLog::new(1000));
        log.set_page(
            None,
            LogPage {
                records: vec![funded_record("0xaa", 998), funded_record("0xbb", 1000)],
                next_page: None,
            },
        );

        let mut config = test_config(1);
        config.start_block = Some(990);
        let (watcher, processor, checkpoints) = build_watcher(config, log);

        run_briefly(&watcher, 100).await;

        let seen = processor.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        // Non-decreasing block order within one watcher
        assert!(seen.windows(2).all(|w| w[0].1 <= w[1].1));

        let checkpoint = checkpoints.load(ChainId(1)).await.unwrap().unwrap();
        assert_eq!(checkpoint.last_processed_block, 1000);
    }

    #[tokio::test]
    async fn test_idle_when_no_new_blocks() {
        let log = Arc::new(ScriptedLog::new(990));

        let mut config = test_config(1);
        config.start_block = Some(990);
        let (watcher, processor, checkpoints) = build_watcher(config, log.clone());

        run_briefly(&watcher, 50).await;

        assert!(processor.seen.lock().unwrap().is_empty());
        assert_eq!(log.fetch_calls.load(Ordering::SeqCst), 0);
        // Shutdown persists the unchanged cursor
        let checkpoint = checkpoints.load(ChainId(1)).await.unwrap().unwrap();
        assert_eq!(checkpoint.last_processed_block, 990);
    }

    #[tokio::test]
    async fn test_drains_all_pages_before_advancing() {
        let log = Arc::new(ScriptedLog::new(1000));
        log.set_page(
            None,
            LogPage {
                records: vec![funded_record("0xaa", 995)],
                next_page: Some("page-2".to_string()),
            },
        );
        log.set_page(
            Some("page-2"),
            LogPage {
                records: vec![funded_record("0xbb", 999)],
                next_page: None,
            },
        );

        let mut config = test_config(1);
        config.start_block = Some(990);
        let (watcher, processor, checkpoints) = build_watcher(config, log);

        run_briefly(&watcher, 100).await;

        let seen = processor.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            checkpoints
                .load(ChainId(1))
                .await
                .unwrap()
                .unwrap()
                .last_processed_block,
            1000
        );
    }

    #[tokio::test]
    async fn test_malformed_event_skipped_checkpoint_still_advances() {
        let log = Arc::new(ScriptedLog::new(1000));
        let mut bad = funded_record("0xbad", 995);
        bad.args = json!({ "loanAmount": "not-a-user" }); // missing "user"
        log.set_page(
            None,
            LogPage {
                records: vec![bad, funded_record("0xgood", 996)],
                next_page: None,
            },
        );

        let mut config = test_config(1);
        config.start_block = Some(990);
        let (watcher, processor, checkpoints) = build_watcher(config, log);

        run_briefly(&watcher, 100).await;

        let seen = processor.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "0xgood");
        assert_eq!(
            checkpoints
                .load(ChainId(1))
                .await
                .unwrap()
                .unwrap()
                .last_processed_block,
            1000
        );
    }

    #[tokio::test]
    async fn test_transient_error_backs_off_then_recovers() {
        let log = Arc::new(ScriptedLog::new(1000));
        log.set_page(
            None,
            LogPage {
                records: vec![funded_record("0xaa", 1000)],
                next_page: None,
            },
        );
        log.fail_next_height_calls(2);

        let mut config = test_config(1);
        config.start_block = Some(990);
        let (watcher, processor, checkpoints) = build_watcher(config, log);

        run_briefly(&watcher, 300).await;

        // Both injected failures were absorbed; the range was retried
        // and eventually processed.
        assert_eq!(processor.seen.lock().unwrap().len(), 1);
        assert_eq!(
            checkpoints
                .load(ChainId(1))
                .await
                .unwrap()
                .unwrap()
                .last_processed_block,
            1000
        );
    }

    #[tokio::test]
    async fn test_resumes_from_existing_checkpoint() {
        let log = Arc::new(ScriptedLog::new(1000));
        log.set_page(
            None,
            LogPage {
                records: vec![funded_record("0xaa", 1000)],
                next_page: None,
            },
        );

        let mut config = test_config(1);
        config.start_block = Some(0); // must be ignored in favor of the checkpoint

        let processor = Arc::new(RecordingProcessor::default());
        let mut router = EventRouter::new();
        router.register(config.chain_id, "LoanFunded", processor.clone());

        let checkpoints = Arc::new(InMemoryCheckpointStore::new());
        checkpoints
            .save(&Checkpoint::new(ChainId(1), 999))
            .await
            .unwrap();

        let watcher = ChainWatcher::new(config, log, Arc::new(router), checkpoints.clone());
        run_briefly(&watcher, 100).await;

        assert_eq!(processor.seen.lock().unwrap().len(), 1);
        assert_eq!(
            checkpoints
                .load(ChainId(1))
                .await
                .unwrap()
                .unwrap()
                .last_processed_block,
            1000
        );
    }
}
