//! Staking keeper process.
//!
//! Deposits and the polling loop both feed the watcher; the watcher calls
//! [`BatchStaker`], which holds the batch gate for the duration of a stake.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use stakeops_domain::{format_amount, Amount, Severity};
use stakeops_keeper::{BatchGate, BatchReadyHandler, DepositWatcher, KeeperContext, StakingExecutor};

use crate::alerting::{details, Alerter};
use crate::api::HealthProbe;
use crate::error::DaemonResult;
use crate::process::KeeperProcess;

// =============================================================================
// Batch Staker
// =============================================================================

/// Stakes the pool when the watcher reports it ready.
///
/// At most one stake runs at a time; triggers arriving meanwhile are dropped,
/// not queued. The pool is re-read under the gate, so a trigger whose read
/// straddled another stake does nothing.
pub struct BatchStaker {
    watcher: DepositWatcher,
    executor: StakingExecutor,
    gate: BatchGate,
    alerter: Alerter,
}

impl BatchStaker {
    /// Create a staker.
    pub fn new(watcher: DepositWatcher, executor: StakingExecutor, alerter: Alerter) -> Self {
        Self {
            watcher,
            executor,
            gate: BatchGate::new(),
            alerter,
        }
    }

    /// In-flight gate.
    pub fn gate(&self) -> &BatchGate {
        &self.gate
    }
}

#[async_trait]
impl BatchReadyHandler for BatchStaker {
    async fn on_batch_ready(&self, observed: Amount) {
        let Some(_guard) = self.gate.try_acquire() else {
            info!(pool = %format_amount(observed), "Batch stake already in flight, skipping");
            return;
        };

        let pool_size = match self.watcher.confirm_batch_ready().await {
            Ok(Some(size)) => size,
            Ok(None) => {
                info!(observed = %format_amount(observed), "Pool below threshold under the gate, skipping");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Pool re-check failed, skipping");
                return;
            }
        };

        match self.executor.execute_batch_stake().await {
            Ok(tx_hash) => {
                self.alerter
                    .raise(
                        Severity::Info,
                        "Batch stake executed",
                        details([
                            ("pool_size", json!(format_amount(pool_size))),
                            ("tx_hash", json!(tx_hash)),
                        ]),
                    )
                    .await;
            }
            Err(e) => {
                self.alerter
                    .raise(
                        Severity::Critical,
                        "Batch stake failed after retries",
                        details([
                            ("pool_size", json!(format_amount(pool_size))),
                            ("error", json!(e.to_string())),
                            ("kind", json!(e.kind())),
                        ]),
                    )
                    .await;
            }
        }
    }
}

// =============================================================================
// Process
// =============================================================================

/// Watches deposits and stakes full batches.
pub struct StakingKeeper {
    ctx: KeeperContext,
    watcher: DepositWatcher,
    staker: Arc<BatchStaker>,
}

impl StakingKeeper {
    /// Create the process.
    pub fn new(ctx: KeeperContext, batch_threshold: Amount, alerter: Alerter) -> Self {
        let watcher = DepositWatcher::new(ctx.clone(), batch_threshold);
        let staker = Arc::new(BatchStaker::new(
            watcher.clone(),
            StakingExecutor::new(ctx.clone()),
            alerter,
        ));

        Self {
            ctx,
            watcher,
            staker,
        }
    }

    /// Deposit watcher.
    pub fn watcher(&self) -> &DepositWatcher {
        &self.watcher
    }

    /// Batch handler.
    pub fn staker(&self) -> &Arc<BatchStaker> {
        &self.staker
    }
}

#[async_trait]
impl HealthProbe for StakingKeeper {
    async fn health_checks(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            ("chain_connected".to_string(), self.ctx.chain.is_connected()),
            ("deposit_subscription".to_string(), self.watcher.is_subscribed()),
        ])
    }
}

#[async_trait]
impl KeeperProcess for StakingKeeper {
    fn name(&self) -> &'static str {
        "staking-keeper"
    }

    async fn start(&self) -> DaemonResult<()> {
        self.watcher.start(self.staker.clone()).await?;
        Ok(())
    }

    async fn run_cycle(&self) -> DaemonResult<()> {
        self.watcher.check_pool(self.staker.as_ref()).await?;
        Ok(())
    }

    async fn shutdown(&self) {
        self.watcher.stop();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stakeops_alerts::AlertDispatcher;
    use stakeops_chain::{
        methods, ChainPort, ChainResult, ChainValue, ContractAddresses, EventSubscription,
        RetryPolicy, SimulatedChain, TxReceipt,
    };
    use stakeops_domain::Address;
    use stakeops_keeper::KeeperMetrics;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Simulation whose armed pool read captures its value, then waits for
    /// `release` before returning it.
    struct HeldPoolRead {
        inner: Arc<SimulatedChain>,
        armed: AtomicBool,
        captured: Notify,
        release: Notify,
    }

    impl HeldPoolRead {
        fn new(inner: Arc<SimulatedChain>) -> Self {
            Self {
                inner,
                armed: AtomicBool::new(false),
                captured: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ChainPort for HeldPoolRead {
        async fn connect(&self, rpc_url: &str) -> ChainResult<()> {
            self.inner.connect(rpc_url).await
        }

        fn is_connected(&self) -> bool {
            self.inner.is_connected()
        }

        async fn read_contract(
            &self,
            address: &Address,
            method: &str,
            args: &[ChainValue],
        ) -> ChainResult<ChainValue> {
            let value = self.inner.read_contract(address, method, args).await;
            if method == methods::GET_PENDING_POOL && self.armed.swap(false, Ordering::SeqCst) {
                self.captured.notify_one();
                self.release.notified().await;
            }
            value
        }

        async fn write_contract(
            &self,
            address: &Address,
            method: &str,
            args: &[ChainValue],
        ) -> ChainResult<TxReceipt> {
            self.inner.write_contract(address, method, args).await
        }

        async fn watch_events(&self, address: &Address, event_name: &str) -> ChainResult<EventSubscription> {
            self.inner.watch_events(address, event_name).await
        }
    }

    fn keeper_over(chain: Arc<dyn ChainPort>) -> (StakingKeeper, Arc<AlertDispatcher>) {
        let metrics = Arc::new(KeeperMetrics::new().unwrap());
        let ctx = KeeperContext::new(chain, ContractAddresses::fixture(), metrics.clone())
            .with_retry(RetryPolicy::immediate(3));
        let dispatcher = Arc::new(AlertDispatcher::new(Vec::new()));
        let keeper = StakingKeeper::new(ctx, 100, Alerter::new(dispatcher.clone(), metrics));
        (keeper, dispatcher)
    }

    async fn simulated() -> Arc<SimulatedChain> {
        let chain = Arc::new(SimulatedChain::new(ContractAddresses::fixture()));
        chain.connect("sim://local").await.unwrap();
        chain.add_validator(Address::from_low_u64(0xa), true, 0);
        chain
    }

    async fn setup() -> (Arc<SimulatedChain>, StakingKeeper, Arc<AlertDispatcher>) {
        let chain = simulated().await;
        let (keeper, dispatcher) = keeper_over(chain.clone());
        (chain, keeper, dispatcher)
    }

    fn stake_attempts(chain: &SimulatedChain) -> usize {
        chain
            .writes()
            .iter()
            .filter(|w| w.method == methods::EXECUTE_BATCH_STAKE)
            .count()
    }

    #[tokio::test]
    async fn test_cycle_stakes_full_pool() {
        let (chain, keeper, dispatcher) = setup().await;
        chain.deposit(150);

        keeper.run_cycle().await.unwrap();

        assert_eq!(chain.pending_pool(), 0);
        assert_eq!(chain.applied_writes(methods::EXECUTE_BATCH_STAKE).len(), 1);
        assert_eq!(dispatcher.recent_alerts()[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn test_cycle_below_threshold_does_nothing() {
        let (chain, keeper, dispatcher) = setup().await;
        chain.deposit(99);

        keeper.run_cycle().await.unwrap();

        assert!(chain.writes().is_empty());
        assert!(dispatcher.recent_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_raise_critical() {
        let (chain, keeper, dispatcher) = setup().await;
        chain.deposit(150);
        chain.fail_next(methods::EXECUTE_BATCH_STAKE, 3);

        keeper.run_cycle().await.unwrap();

        let alerts = dispatcher.recent_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].message, "Batch stake failed after retries");
        assert_eq!(chain.pending_pool(), 150);
    }

    #[tokio::test]
    async fn test_busy_gate_drops_trigger() {
        let (chain, keeper, _) = setup().await;
        chain.deposit(150);

        let _held = keeper.staker().gate().try_acquire().unwrap();
        keeper.run_cycle().await.unwrap();

        assert!(chain.writes().is_empty());
    }

    #[tokio::test]
    async fn test_stale_trigger_on_drained_pool_does_nothing() {
        let (chain, keeper, dispatcher) = setup().await;

        keeper.staker().on_batch_ready(150).await;

        assert_eq!(stake_attempts(&chain), 0);
        assert!(dispatcher.recent_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_event_read_straddling_a_stake_does_not_restake() {
        let sim = simulated().await;
        sim.deposit(150);
        let held = Arc::new(HeldPoolRead::new(sim.clone()));
        let (keeper, dispatcher) = keeper_over(held.clone());
        let keeper = Arc::new(keeper);

        // Event-driven check reads 150, then stalls before acting on it
        held.armed.store(true, Ordering::SeqCst);
        let event_check = {
            let keeper = keeper.clone();
            tokio::spawn(async move { keeper.watcher().check_pool(keeper.staker().as_ref()).await })
        };
        held.captured.notified().await;

        // Polling cycle stakes the pool and releases the gate
        keeper.run_cycle().await.unwrap();
        assert_eq!(sim.pending_pool(), 0);
        assert!(!keeper.staker().gate().is_busy());

        held.release.notify_one();
        assert_eq!(event_check.await.unwrap().unwrap(), 150);

        assert_eq!(stake_attempts(&sim), 1);
        let severities: Vec<Severity> = dispatcher.recent_alerts().iter().map(|a| a.severity).collect();
        assert_eq!(severities, vec![Severity::Info]);
    }

    #[tokio::test]
    async fn test_health_tracks_subscription() {
        let (_chain, keeper, _) = setup().await;

        let before = keeper.health_checks().await;
        assert_eq!(before.get("deposit_subscription"), Some(&false));

        keeper.start().await.unwrap();
        let running = keeper.health_checks().await;
        assert_eq!(running.get("chain_connected"), Some(&true));
        assert_eq!(running.get("deposit_subscription"), Some(&true));

        keeper.shutdown().await;
        keeper.shutdown().await;
        assert!(!keeper.watcher().is_subscribed());
    }
}
