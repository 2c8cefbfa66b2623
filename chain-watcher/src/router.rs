//! Event routing table
//!
//! Stateless dispatch from `(chain, event name)` to a registered
//! processor. Built once at startup, read-only afterwards.

use crate::metrics::WATCHER_EVENTS_TOTAL;
use relay_core::types::{ChainId, RawEvent};
use relay_core::EventProcessor;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened to a routed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A processor accepted the event
    Routed,
    /// No processor is registered for this `(chain, event)` pair
    Unhandled,
    /// The processor returned an error (logged, isolated)
    ProcessorFailed,
}

/// Dispatch table from `(chain, event name)` to processors
#[derive(Default)]
pub struct EventRouter {
    routes: HashMap<ChainId, HashMap<String, Arc<dyn EventProcessor>>>,
}

impl EventRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `processor` for `(chain_id, event_name)`
    ///
    /// Re-registering a pair replaces the previous processor.
    pub fn register(
        &mut self,
        chain_id: ChainId,
        event_name: impl Into<String>,
        processor: Arc<dyn EventProcessor>,
    ) {
        self.routes
            .entry(chain_id)
            .or_default()
            .insert(event_name.into(), processor);
    }

    /// Route one event to its processor
    ///
    /// Unregistered pairs are logged and dropped. Processor errors are
    /// caught and logged per event; they never propagate to the caller,
    /// so one bad event cannot block a checkpoint advance for its
    /// batch.
    pub async fn route(&self, event: &RawEvent) -> RouteOutcome {
        let processor = self
            .routes
            .get(&event.chain_id)
            .and_then(|chain_routes| chain_routes.get(&event.event_name));

        let Some(processor) = processor else {
            warn!(
                chain = %event.chain_id,
                event_name = %event.event_name,
                tx_hash = %event.tx_hash,
                "Dropping unhandled event"
            );
            WATCHER_EVENTS_TOTAL
                .with_label_values(&[
                    &event.chain_id.to_string(),
                    &event.event_name,
                    "unhandled",
                ])
                .inc();
            return RouteOutcome::Unhandled;
        };

        match processor.process_event(event).await {
            Ok(()) => {
                debug!(
                    chain = %event.chain_id,
                    event_name = %event.event_name,
                    block = event.block_number,
                    "Event routed"
                );
                WATCHER_EVENTS_TOTAL
                    .with_label_values(&[&event.chain_id.to_string(), &event.event_name, "routed"])
                    .inc();
                RouteOutcome::Routed
            }
            Err(e) => {
                error!(
                    chain = %event.chain_id,
                    event_name = %event.event_name,
                    tx_hash = %event.tx_hash,
                    "Processor failed: {}", e
                );
                WATCHER_EVENTS_TOTAL
                    .with_label_values(&[&event.chain_id.to_string(), &event.event_name, "failed"])
                    .inc();
                RouteOutcome::ProcessorFailed
            }
        }
    }

    /// Number of registered `(chain, event)` pairs
    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    /// Whether no routes are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::types::{EventPayload, LoanFunding};
    use relay_core::{Error, Result};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProcessor {
        calls: AtomicU32,
        fail: bool,
    }

    impl CountingProcessor {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl EventProcessor for CountingProcessor {
        async fn process_event(&self, _event: &RawEvent) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Validation("bad payload".to_string()));
            }
            Ok(())
        }
    }

    fn test_event(chain: u64, name: &str) -> RawEvent {
        RawEvent {
            chain_id: ChainId(chain),
            contract_address: "0xC0FFEE".to_string(),
            event_name: name.to_string(),
            tx_hash: "0xaa".to_string(),
            log_index: 0,
            block_number: 100,
            payload: EventPayload::LoanFunded(LoanFunding {
                borrower: "0xABC".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_route_dispatches_to_registered_processor() {
        let processor = Arc::new(CountingProcessor::new(false));
        let mut router = EventRouter::new();
        router.register(ChainId(1), "LoanFunded", processor.clone());

        let outcome = router.route(&test_event(1, "LoanFunded")).await;
        assert_eq!(outcome, RouteOutcome::Routed);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unregistered_pair_is_dropped() {
        let processor = Arc::new(CountingProcessor::new(false));
        let mut router = EventRouter::new();
        router.register(ChainId(1), "LoanFunded", processor.clone());

        // Same event name, different chain
        assert_eq!(
            router.route(&test_event(2, "LoanFunded")).await,
            RouteOutcome::Unhandled
        );
        // Same chain, different event name
        assert_eq!(
            router.route(&test_event(1, "LoanRepaid")).await,
            RouteOutcome::Unhandled
        );
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_processor_error_is_isolated() {
        let mut router = EventRouter::new();
        router.register(ChainId(1), "LoanFunded", Arc::new(CountingProcessor::new(true)));

        let outcome = router.route(&test_event(1, "LoanFunded")).await;
        assert_eq!(outcome, RouteOutcome::ProcessorFailed);
    }
}
