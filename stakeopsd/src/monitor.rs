//! Monitor process.
//!
//! Each cycle:
//! 1. Fetch TVL and compare against the previous cycle
//! 2. Check the exchange rate against parity
//! 3. Check every configured validator
//!
//! Steps are independent; a failure in one does not skip the others.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use stakeops_domain::{format_amount, Address, Severity};
use stakeops_keeper::{KeeperContext, TvlTracker, ValidatorHealthChecker, PARITY_EXCHANGE_RATE_BPS};

use crate::alerting::{details, Alerter};
use crate::api::HealthProbe;
use crate::error::DaemonResult;
use crate::process::KeeperProcess;

/// Tracks TVL, exchange rate and validator health.
pub struct Monitor {
    ctx: KeeperContext,
    tvl: TvlTracker,
    validators: ValidatorHealthChecker,
    alerter: Alerter,
    last_cycle_ok: AtomicBool,
}

impl Monitor {
    /// Create the process.
    pub fn new(
        ctx: KeeperContext,
        asset_price_usd: Decimal,
        tvl_drop_threshold_percent: f64,
        validators: Vec<Address>,
        alerter: Alerter,
    ) -> Self {
        Self {
            tvl: TvlTracker::new(ctx.clone(), asset_price_usd, tvl_drop_threshold_percent),
            validators: ValidatorHealthChecker::new(ctx.clone(), validators),
            ctx,
            alerter,
            last_cycle_ok: AtomicBool::new(false),
        }
    }

    /// TVL tracker.
    pub fn tvl(&self) -> &TvlTracker {
        &self.tvl
    }

    /// Validator health checker.
    pub fn validators(&self) -> &ValidatorHealthChecker {
        &self.validators
    }

    async fn check_tvl(&self) -> DaemonResult<()> {
        let tvl = self.tvl.fetch_tvl().await?;
        let change = self.tvl.get_tvl_change_percent(tvl.total);

        info!(
            total = %format_amount(tvl.total),
            usd = tvl.total_usd,
            change_percent = change,
            "TVL updated"
        );

        if self.tvl.check_significant_drop(change) {
            self.alerter
                .raise(
                    Severity::Critical,
                    "Significant TVL drop detected",
                    details([
                        ("change_percent", json!(change)),
                        ("threshold_percent", json!(self.tvl.drop_threshold_percent())),
                        ("total", json!(format_amount(tvl.total))),
                        ("total_usd", json!(tvl.total_usd)),
                    ]),
                )
                .await;
        }
        Ok(())
    }

    async fn check_exchange_rate(&self) -> DaemonResult<()> {
        let rate = self.tvl.get_exchange_rate().await?;

        if rate < PARITY_EXCHANGE_RATE_BPS {
            self.alerter
                .raise(
                    Severity::Warning,
                    "Exchange rate below parity",
                    details([("rate_bps", json!(rate.to_string()))]),
                )
                .await;
        }
        Ok(())
    }

    async fn check_validators(&self) {
        let summary = self.validators.check_validators().await;
        if summary.failed > 0 {
            warn!(failed = summary.failed, "Some validators could not be read");
        }

        for status in self.validators.get_unhealthy_validators().await {
            self.alerter
                .raise(
                    Severity::Warning,
                    format!("Validator {} is inactive", status.address),
                    details([("stake", json!(format_amount(status.stake)))]),
                )
                .await;
        }

        info!(
            active = summary.active,
            inactive = summary.inactive,
            "Validators checked"
        );
    }
}

#[async_trait]
impl HealthProbe for Monitor {
    async fn health_checks(&self) -> BTreeMap<String, bool> {
        BTreeMap::from([
            ("chain_connected".to_string(), self.ctx.chain.is_connected()),
            ("last_cycle_ok".to_string(), self.last_cycle_ok.load(Ordering::SeqCst)),
        ])
    }
}

#[async_trait]
impl KeeperProcess for Monitor {
    fn name(&self) -> &'static str {
        "monitor"
    }

    async fn run_cycle(&self) -> DaemonResult<()> {
        let tvl = self.check_tvl().await;
        let rate = self.check_exchange_rate().await;
        self.check_validators().await;

        self.last_cycle_ok
            .store(tvl.is_ok() && rate.is_ok(), Ordering::SeqCst);
        tvl.and(rate)
    }
}

// =============================================================================
// Tests
// =============================================================================
