//! Withdrawal keeper process.
//!
//! Each cycle claims every ready request (unstaking first if the buffer is
//! short), then checks the buffer against its minimum.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::warn;

use stakeops_domain::{format_amount, Amount, Severity};
use stakeops_keeper::{KeeperContext, LiquidityManager, QueueMonitor, WithdrawalProcessor};

use crate::alerting::{details, Alerter};
use crate::api::HealthProbe;
use crate::error::DaemonResult;
use crate::process::KeeperProcess;

/// Claims ready withdrawals and watches the liquidity buffer.
pub struct WithdrawalKeeper {
    ctx: KeeperContext,
    processor: WithdrawalProcessor,
    alerter: Alerter,
}

impl WithdrawalKeeper {
    /// Create the process.
    pub fn new(ctx: KeeperContext, min_liquidity_buffer: Amount, alerter: Alerter) -> Self {
        let processor = WithdrawalProcessor::new(
            ctx.clone(),
            QueueMonitor::new(ctx.clone()),
            LiquidityManager::new(ctx.clone(), min_liquidity_buffer),
        );

        Self {
            ctx,
            processor,
            alerter,
        }
    }

    /// Withdrawal processor.
    pub fn processor(&self) -> &WithdrawalProcessor {
        &self.processor
    }

    async fn process_withdrawals(&self) -> DaemonResult<()> {
        let report = self.processor.process_cycle(Utc::now()).await?;

        if !report.failed.is_empty() {
            self.alerter
                .raise(
                    Severity::Warning,
                    "Withdrawal claims failed",
                    details([
                        ("failed", json!(report.failed)),
                        ("processed", json!(report.processed)),
                        ("ready", json!(report.ready)),
                    ]),
                )
                .await;
        }
        Ok(())
    }

    async fn check_buffer(&self) -> DaemonResult<()> {
        let liquidity = self.processor.liquidity();
        let buffer = liquidity.get_buffer_balance().await?;

        if buffer < liquidity.min_buffer() {
            warn!(
                buffer = %format_amount(buffer),
                minimum = %format_amount(liquidity.min_buffer()),
                "Liquidity buffer below minimum"
            );
            self.alerter
                .raise(
                    Severity::Warning,
                    "Liquidity buffer below minimum",
                    details([
                        ("buffer", json!(format_amount(buffer))),
                        ("minimum", json!(format_amount(liquidity.min_buffer()))),
                    ]),
                )
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for WithdrawalKeeper {
    async fn health_checks(&self) -> BTreeMap<String, bool> {
        let buffer_ok = self
            .processor
            .liquidity()
            .check_min_buffer_maintained()
            .await
            .unwrap_or(false);

        BTreeMap::from([
            ("chain_connected".to_string(), self.ctx.chain.is_connected()),
            ("min_buffer_maintained".to_string(), buffer_ok),
        ])
    }
}

#[async_trait]
impl KeeperProcess for WithdrawalKeeper {
    fn name(&self) -> &'static str {
        "withdrawal-keeper"
    }

    async fn run_cycle(&self) -> DaemonResult<()> {
        // The buffer is checked even when processing fails
        let processed = self.process_withdrawals().await;
        let checked = self.check_buffer().await;
        processed.and(checked)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stakeops_alerts::AlertDispatcher;
    use stakeops_chain::{methods, ChainPort, ContractAddresses, RetryPolicy, SimulatedChain};
    use stakeops_domain::Address;
    use stakeops_keeper::KeeperMetrics;
    use std::sync::Arc;

    async fn setup(min_buffer: Amount) -> (Arc<SimulatedChain>, WithdrawalKeeper, Arc<AlertDispatcher>) {
        let chain = Arc::new(SimulatedChain::new(ContractAddresses::fixture()));
        chain.connect("sim://local").await.unwrap();
        chain.add_validator(Address::from_low_u64(0xa), true, 10_000);

        let metrics = Arc::new(KeeperMetrics::new().unwrap());
        let ctx = KeeperContext::new(chain.clone(), ContractAddresses::fixture(), metrics.clone())
            .with_retry(RetryPolicy::immediate(3));
        let dispatcher = Arc::new(AlertDispatcher::new(Vec::new()));
        let keeper = WithdrawalKeeper::new(ctx, min_buffer, Alerter::new(dispatcher.clone(), metrics));
        (chain, keeper, dispatcher)
    }

    #[tokio::test]
    async fn test_cycle_claims_ready_requests() {
        let (chain, keeper, dispatcher) = setup(0).await;
        chain.set_liquidity_buffer(1_000);
        let a = chain.add_claimable_request(300);
        let b = chain.add_claimable_request(200);

        keeper.run_cycle().await.unwrap();

        assert!(chain.is_claimed(a));
        assert!(chain.is_claimed(b));
        assert_eq!(chain.liquidity_buffer(), 500);
        assert!(dispatcher.recent_alerts().is_empty());
    }

    #[tokio::test]
    async fn test_failed_claim_raises_warning() {
        let (chain, keeper, dispatcher) = setup(0).await;
        chain.set_liquidity_buffer(1_000);
        chain.add_claimable_request(300);
        let bad = chain.add_claimable_request(200);
        chain.fail_claims(bad);

        keeper.run_cycle().await.unwrap();

        let alerts = dispatcher.recent_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Withdrawal claims failed");
        assert_eq!(alerts[0].details.get("failed"), Some(&json!([bad])));
    }

    #[tokio::test]
    async fn test_low_buffer_raises_warning_and_fails_health() {
        let (chain, keeper, dispatcher) = setup(1_000).await;
        chain.set_liquidity_buffer(400);

        keeper.run_cycle().await.unwrap();

        let alerts = dispatcher.recent_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].message, "Liquidity buffer below minimum");

        let checks = keeper.health_checks().await;
        assert_eq!(checks.get("min_buffer_maintained"), Some(&false));
    }

    #[tokio::test]
    async fn test_unstake_failure_still_checks_buffer() {
        let (chain, keeper, dispatcher) = setup(1_000).await;
        chain.set_liquidity_buffer(100);
        chain.add_claimable_request(500);
        chain.fail_next(methods::REQUEST_UNSTAKE, 3);

        assert!(keeper.run_cycle().await.is_err());

        let alerts = dispatcher.recent_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "Liquidity buffer below minimum");
        assert!(chain.applied_writes(methods::CLAIM_WITHDRAWAL).is_empty());
    }
}
