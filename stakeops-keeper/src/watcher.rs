//! Deposit Batch Watcher
//!
//! Decides when the pending pool is large enough to stake. Two triggers
//! feed the same predicate:
//!
//! ```text
//!   Deposit event ──┐
//!                   ├─→ check_pool() ─→ pool >= threshold ─→ BatchReadyHandler
//!   Polling loop ───┘
//! ```
//!
//! Re-entrancy is the handler's concern (see `BatchGate`).

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use stakeops_chain::{methods, SubscriptionHandle};
use stakeops_domain::{format_amount, Amount};

use crate::context::KeeperContext;
use crate::error::KeeperResult;
use crate::metrics::amount_gauge_value;

/// Callback invoked when the pool has reached the batch threshold.
#[async_trait]
pub trait BatchReadyHandler: Send + Sync {
    /// Called with the pool size that satisfied the threshold.
    async fn on_batch_ready(&self, pool_size: Amount);
}

struct WatchTask {
    handle: SubscriptionHandle,
    _task: JoinHandle<()>,
}

/// Watches the pending pool against the batch threshold.
#[derive(Clone)]
pub struct DepositWatcher {
    ctx: KeeperContext,
    batch_threshold: Amount,
    subscription: Arc<Mutex<Option<WatchTask>>>,
}

impl DepositWatcher {
    /// Create a watcher for `batch_threshold`.
    pub fn new(ctx: KeeperContext, batch_threshold: Amount) -> Self {
        Self {
            ctx,
            batch_threshold,
            subscription: Arc::new(Mutex::new(None)),
        }
    }

    /// Configured threshold.
    pub fn batch_threshold(&self) -> Amount {
        self.batch_threshold
    }

    /// Read the pending pool and export it as a gauge.
    pub async fn get_pool_size(&self) -> KeeperResult<Amount> {
        let pool = self
            .ctx
            .chain
            .read_uint(&self.ctx.addresses.core, methods::GET_PENDING_POOL, &[])
            .await?;

        self.ctx.metrics.pending_pool.set(amount_gauge_value(pool));
        Ok(pool)
    }

    /// Whether `pool_size` has reached the threshold.
    pub fn is_batch_ready(&self, pool_size: Amount) -> bool {
        pool_size >= self.batch_threshold
    }

    /// Read the pool and invoke `handler` if the threshold is met.
    ///
    /// Returns the observed pool size.
    pub async fn check_pool(&self, handler: &dyn BatchReadyHandler) -> KeeperResult<Amount> {
        let pool_size = match self.get_pool_size().await {
            Ok(size) => size,
            Err(e) => {
                self.ctx.metrics.record_error("check_pool", &e);
                return Err(e);
            }
        };

        if self.is_batch_ready(pool_size) {
            info!(
                pool = %format_amount(pool_size),
                threshold = %format_amount(self.batch_threshold),
                "Batch threshold reached"
            );
            handler.on_batch_ready(pool_size).await;
        } else {
            debug!(pool = %format_amount(pool_size), "Pool below batch threshold");
        }

        Ok(pool_size)
    }

    /// Re-read the pool and return it if the threshold is still met.
    ///
    /// Handlers call this once they hold the batch gate; a size observed
    /// before the gate is stale if a concurrent stake drained the pool.
    pub async fn confirm_batch_ready(&self) -> KeeperResult<Option<Amount>> {
        let pool_size = match self.get_pool_size().await {
            Ok(size) => size,
            Err(e) => {
                self.ctx.metrics.record_error("check_pool", &e);
                return Err(e);
            }
        };

        Ok(self.is_batch_ready(pool_size).then_some(pool_size))
    }

    /// Subscribe to deposit events and re-check the pool on each one.
    ///
    /// Does nothing if already subscribed.
    pub async fn start(&self, handler: Arc<dyn BatchReadyHandler>) -> KeeperResult<()> {
        if self.is_subscribed() {
            return Ok(());
        }

        let mut subscription = self
            .ctx
            .chain
            .watch_events(&self.ctx.addresses.core, methods::DEPOSIT_EVENT)
            .await?;
        let handle = subscription.handle();

        let watcher = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                debug!(block = event.block_number, "Deposit event received");
                if let Err(e) = watcher.check_pool(handler.as_ref()).await {
                    warn!(error = %e, "Event-driven pool check failed");
                }
            }
            debug!("Deposit subscription closed");
        });

        let mut slot = match self.subscription.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = slot.take() {
            previous.handle.unsubscribe();
        }
        *slot = Some(WatchTask { handle, _task: task });

        info!("Subscribed to deposit events");
        Ok(())
    }

    /// Unsubscribe from deposit events. Idempotent, safe before `start`.
    pub fn stop(&self) {
        let watch = match self.subscription.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(watch) = watch {
            watch.handle.unsubscribe();
            info!("Unsubscribed from deposit events");
        }
    }

    /// Whether the deposit subscription is live.
    pub fn is_subscribed(&self) -> bool {
        let slot = match self.subscription.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.as_ref()
            .map(|w| !w.handle.is_unsubscribed())
            .unwrap_or(false)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::BatchGate;
    use crate::metrics::KeeperMetrics;
    use stakeops_chain::{ChainPort, ContractAddresses, SimulatedChain};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    const THRESHOLD: Amount = 200_000;

    #[derive(Default)]
    struct CountingHandler {
        calls: Mutex<Vec<Amount>>,
    }

    #[async_trait]
    impl BatchReadyHandler for CountingHandler {
        async fn on_batch_ready(&self, pool_size: Amount) {
            self.calls.lock().unwrap().push(pool_size);
        }
    }

    /// Holds the gate until released, like an in-flight batch stake.
    struct SlowHandler {
        gate: BatchGate,
        started: Notify,
        release: Notify,
        executions: AtomicU32,
        dropped: AtomicU32,
    }

    #[async_trait]
    impl BatchReadyHandler for SlowHandler {
        async fn on_batch_ready(&self, _pool_size: Amount) {
            let Some(_guard) = self.gate.try_acquire() else {
                self.dropped.fetch_add(1, Ordering::SeqCst);
                return;
            };
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
        }
    }

    async fn setup() -> (Arc<SimulatedChain>, DepositWatcher) {
        let chain = Arc::new(SimulatedChain::new(ContractAddresses::fixture()));
        chain.connect("sim://local").await.unwrap();
        let ctx = KeeperContext::new(
            chain.clone(),
            ContractAddresses::fixture(),
            Arc::new(KeeperMetrics::new().unwrap()),
        );
        (chain, DepositWatcher::new(ctx, THRESHOLD))
    }

    #[tokio::test]
    async fn test_threshold_crossing_triggers_once() {
        let (chain, watcher) = setup().await;
        let handler = CountingHandler::default();

        for pool in [50_000, 150_000, 200_000] {
            chain.set_pending_pool(pool);
            watcher.check_pool(&handler).await.unwrap();
        }

        assert_eq!(*handler.calls.lock().unwrap(), vec![200_000]);
    }

    #[tokio::test]
    async fn test_is_batch_ready_boundary() {
        let (_chain, watcher) = setup().await;
        assert!(!watcher.is_batch_ready(THRESHOLD - 1));
        assert!(watcher.is_batch_ready(THRESHOLD));
        assert!(watcher.is_batch_ready(THRESHOLD + 1));
    }

    #[tokio::test]
    async fn test_confirm_rereads_the_pool() {
        let (chain, watcher) = setup().await;

        chain.set_pending_pool(THRESHOLD);
        assert_eq!(watcher.confirm_batch_ready().await.unwrap(), Some(THRESHOLD));

        chain.set_pending_pool(0);
        assert_eq!(watcher.confirm_batch_ready().await.unwrap(), None);

        chain.fail_next(methods::GET_PENDING_POOL, 1);
        assert!(watcher.confirm_batch_ready().await.is_err());
        assert_eq!(watcher.ctx.metrics.error_count("check_pool", "rpc"), 1);
    }

    #[tokio::test]
    async fn test_concurrent_check_during_inflight_batch_is_dropped() {
        let (chain, watcher) = setup().await;
        chain.set_pending_pool(THRESHOLD);

        let handler = Arc::new(SlowHandler {
            gate: BatchGate::new(),
            started: Notify::new(),
            release: Notify::new(),
            executions: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        });

        let polling = {
            let watcher = watcher.clone();
            let handler = handler.clone();
            tokio::spawn(async move { watcher.check_pool(handler.as_ref()).await })
        };
        handler.started.notified().await;

        // Event-driven check while the first batch is in flight
        watcher.check_pool(handler.as_ref()).await.unwrap();

        handler.release.notify_one();
        polling.await.unwrap().unwrap();

        assert_eq!(handler.executions.load(Ordering::SeqCst), 1);
        assert_eq!(handler.dropped.load(Ordering::SeqCst), 1);
        assert!(!handler.gate.is_busy());
    }

    #[tokio::test]
    async fn test_deposit_event_triggers_check() {
        let (chain, watcher) = setup().await;
        let handler = Arc::new(CountingHandler::default());

        watcher.start(handler.clone()).await.unwrap();
        assert!(watcher.is_subscribed());

        chain.deposit(THRESHOLD);

        for _ in 0..50 {
            if !handler.calls.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*handler.calls.lock().unwrap(), vec![THRESHOLD]);

        watcher.stop();
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_safe_before_start() {
        let (chain, watcher) = setup().await;
        watcher.stop();
        assert!(!watcher.is_subscribed());

        watcher.start(Arc::new(CountingHandler::default())).await.unwrap();
        watcher.stop();
        watcher.stop();

        assert!(!watcher.is_subscribed());
        assert_eq!(chain.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_read_failure_is_counted() {
        let (chain, watcher) = setup().await;
        chain.fail_next(methods::GET_PENDING_POOL, 1);

        assert!(watcher.check_pool(&CountingHandler::default()).await.is_err());
        assert_eq!(watcher.ctx.metrics.error_count("check_pool", "rpc"), 1);
    }
}
