//! TVL Tracker
//!
//! Fetches the three TVL buckets, derives the staked share and USD value,
//! and compares each total against the previous one.

use rust_decimal::Decimal;
use std::sync::Mutex;
use tracing::debug;

use stakeops_chain::methods;
use stakeops_domain::{Amount, TvlData};

use crate::context::KeeperContext;
use crate::error::KeeperResult;
use crate::metrics::amount_gauge_value;

/// Exchange rate at parity (stAsset worth exactly one underlying unit)
pub const PARITY_EXCHANGE_RATE_BPS: Amount = 10_000;

/// Tracks TVL and flags significant drops between polls.
pub struct TvlTracker {
    ctx: KeeperContext,
    asset_price_usd: Decimal,
    drop_threshold_percent: f64,
    previous_total: Mutex<Option<Amount>>,
}

impl TvlTracker {
    /// Create a tracker valuing TVL at `asset_price_usd`.
    pub fn new(ctx: KeeperContext, asset_price_usd: Decimal, drop_threshold_percent: f64) -> Self {
        Self {
            ctx,
            asset_price_usd,
            drop_threshold_percent,
            previous_total: Mutex::new(None),
        }
    }

    /// Fetch and derive the current TVL.
    ///
    /// # Errors
    /// Chain read failures, and `DomainError::InconsistentTvl` when pool plus
    /// buffer exceed the reported total.
    pub async fn fetch_tvl(&self) -> KeeperResult<TvlData> {
        let chain = &self.ctx.chain;
        let core = &self.ctx.addresses.core;

        let total = chain.read_uint(core, methods::GET_TVL, &[]).await?;
        let pending_pool = chain.read_uint(core, methods::GET_PENDING_POOL, &[]).await?;
        let liquidity_buffer = chain
            .read_uint(&self.ctx.addresses.vault, methods::GET_LIQUIDITY_BUFFER, &[])
            .await?;

        let tvl = TvlData::derive(total, pending_pool, liquidity_buffer, self.asset_price_usd)?;

        let metrics = &self.ctx.metrics;
        metrics.tvl_total.set(amount_gauge_value(tvl.total));
        metrics.tvl_usd.set(tvl.total_usd);
        metrics.tvl_staked.set(amount_gauge_value(tvl.staked_to_validators));
        metrics.pending_pool.set(amount_gauge_value(tvl.pending_pool));
        metrics.liquidity_buffer.set(amount_gauge_value(tvl.liquidity_buffer));

        debug!(total = tvl.total, usd = tvl.total_usd, "TVL fetched");
        Ok(tvl)
    }

    /// Percent change of `current_total` against the previous call, then
    /// store `current_total` as the new baseline.
    ///
    /// Returns 0 when there is no baseline yet (or it was zero).
    pub fn get_tvl_change_percent(&self, current_total: Amount) -> f64 {
        let mut previous = match self.previous_total.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let change = match *previous {
            Some(prev) if prev > 0 => (current_total as f64 - prev as f64) / prev as f64 * 100.0,
            _ => 0.0,
        };

        *previous = Some(current_total);
        change
    }

    /// Whether `change_percent` is a drop beyond the configured threshold.
    pub fn check_significant_drop(&self, change_percent: f64) -> bool {
        change_percent < -self.drop_threshold_percent
    }

    /// Configured drop threshold in percent.
    pub fn drop_threshold_percent(&self) -> f64 {
        self.drop_threshold_percent
    }

    /// Current stAsset exchange rate in basis points.
    pub async fn get_exchange_rate(&self) -> KeeperResult<Amount> {
        let rate = self
            .ctx
            .chain
            .read_uint(&self.ctx.addresses.core, methods::GET_EXCHANGE_RATE, &[])
            .await?;

        self.ctx
            .metrics
            .exchange_rate_bps
            .set(i64::try_from(rate).unwrap_or(i64::MAX));
        Ok(rate)
    }
}

// =============================================================================
// Tests
// =============================================================================
