//! Prometheus metrics owned by a keeper process.
//!
//! Each process builds one `KeeperMetrics` and shares it (`Arc`) with its
//! components. Nothing is registered globally.

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::time::Duration;

use stakeops_domain::{Amount, Severity, WEI_PER_UNIT};

use crate::error::{KeeperError, KeeperResult};

/// Latency buckets for transaction submission (seconds)
const TX_LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Amount in whole units, for gauges.
pub fn amount_gauge_value(amount: Amount) -> f64 {
    amount as f64 / WEI_PER_UNIT as f64
}

// =============================================================================
// Keeper Metrics
// =============================================================================

/// Counters, gauges, and histograms exported on `/metrics`.
pub struct KeeperMetrics {
    registry: Registry,

    /// Batch stakes submitted successfully
    pub batches_processed: IntCounter,
    /// Withdrawal claims submitted successfully
    pub withdrawals_processed: IntCounter,
    /// Failed operations by `{operation, kind}`
    pub errors: IntCounterVec,
    /// Transaction submission latency by `{method}`
    pub tx_latency: HistogramVec,

    /// Pending deposit pool (units)
    pub pending_pool: Gauge,
    /// Total value locked (units)
    pub tvl_total: Gauge,
    /// Total value locked (USD)
    pub tvl_usd: Gauge,
    /// Stake delegated to validators (units)
    pub tvl_staked: Gauge,
    /// Liquidity buffer (units)
    pub liquidity_buffer: Gauge,
    /// Exchange rate in basis points
    pub exchange_rate_bps: IntGauge,

    /// Requests in the withdrawal queue
    pub queue_length: IntGauge,
    /// Requests ready to claim
    pub queue_ready: IntGauge,
    /// Sum of pending request amounts (units)
    pub queue_pending: Gauge,

    /// Validators reported active
    pub validators_active: IntGauge,
    /// Validators reported inactive
    pub validators_inactive: IntGauge,

    /// Alerts fanned out by `{severity}`
    pub alerts_sent: IntCounterVec,
    /// Alerts suppressed by cooldown by `{severity}`
    pub alerts_suppressed: IntCounterVec,
}

impl KeeperMetrics {
    /// Create and register every metric in a fresh registry.
    pub fn new() -> KeeperResult<Self> {
        let registry = Registry::new();

        let batches_processed = IntCounter::new(
            "stakeops_batches_processed_total",
            "Batch stakes submitted successfully",
        )?;
        let withdrawals_processed = IntCounter::new(
            "stakeops_withdrawals_processed_total",
            "Withdrawal claims submitted successfully",
        )?;
        let errors = IntCounterVec::new(
            Opts::new("stakeops_errors_total", "Failed keeper operations"),
            &["operation", "kind"],
        )?;
        let tx_latency = HistogramVec::new(
            HistogramOpts::new(
                "stakeops_tx_latency_seconds",
                "Time from submission to receipt, retries included",
            )
            .buckets(TX_LATENCY_BUCKETS.to_vec()),
            &["method"],
        )?;

        let pending_pool = Gauge::new("stakeops_pending_pool", "Pending deposit pool")?;
        let tvl_total = Gauge::new("stakeops_tvl_total", "Total value locked")?;
        let tvl_usd = Gauge::new("stakeops_tvl_usd", "Total value locked in USD")?;
        let tvl_staked = Gauge::new("stakeops_tvl_staked", "Stake delegated to validators")?;
        let liquidity_buffer = Gauge::new("stakeops_liquidity_buffer", "Liquidity buffer")?;
        let exchange_rate_bps = IntGauge::new(
            "stakeops_exchange_rate_bps",
            "stAsset exchange rate in basis points",
        )?;

        let queue_length = IntGauge::new("stakeops_queue_length", "Withdrawal queue length")?;
        let queue_ready = IntGauge::new("stakeops_queue_ready", "Withdrawal requests ready to claim")?;
        let queue_pending = Gauge::new("stakeops_queue_pending", "Pending withdrawal amount")?;

        let validators_active = IntGauge::new("stakeops_validators_active", "Active validators")?;
        let validators_inactive =
            IntGauge::new("stakeops_validators_inactive", "Inactive validators")?;

        let alerts_sent = IntCounterVec::new(
            Opts::new("stakeops_alerts_sent_total", "Alerts fanned out"),
            &["severity"],
        )?;
        let alerts_suppressed = IntCounterVec::new(
            Opts::new("stakeops_alerts_suppressed_total", "Alerts suppressed by cooldown"),
            &["severity"],
        )?;

        registry.register(Box::new(batches_processed.clone()))?;
        registry.register(Box::new(withdrawals_processed.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(tx_latency.clone()))?;
        registry.register(Box::new(pending_pool.clone()))?;
        registry.register(Box::new(tvl_total.clone()))?;
        registry.register(Box::new(tvl_usd.clone()))?;
        registry.register(Box::new(tvl_staked.clone()))?;
        registry.register(Box::new(liquidity_buffer.clone()))?;
        registry.register(Box::new(exchange_rate_bps.clone()))?;
        registry.register(Box::new(queue_length.clone()))?;
        registry.register(Box::new(queue_ready.clone()))?;
        registry.register(Box::new(queue_pending.clone()))?;
        registry.register(Box::new(validators_active.clone()))?;
        registry.register(Box::new(validators_inactive.clone()))?;
        registry.register(Box::new(alerts_sent.clone()))?;
        registry.register(Box::new(alerts_suppressed.clone()))?;

        Ok(Self {
            registry,
            batches_processed,
            withdrawals_processed,
            errors,
            tx_latency,
            pending_pool,
            tvl_total,
            tvl_usd,
            tvl_staked,
            liquidity_buffer,
            exchange_rate_bps,
            queue_length,
            queue_ready,
            queue_pending,
            validators_active,
            validators_inactive,
            alerts_sent,
            alerts_suppressed,
        })
    }

    /// Count a failed operation.
    pub fn record_error(&self, operation: &str, error: &KeeperError) {
        self.errors.with_label_values(&[operation, error.kind()]).inc();
    }

    /// Record the latency of a submitted transaction.
    pub fn observe_tx(&self, method: &str, elapsed: Duration) {
        self.tx_latency
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    /// Count a raised alert.
    pub fn record_alert(&self, severity: Severity, dispatched: bool) {
        let counter = if dispatched {
            &self.alerts_sent
        } else {
            &self.alerts_suppressed
        };
        counter.with_label_values(&[severity.as_str()]).inc();
    }

    /// Current value of the error counter for `{operation, kind}`.
    pub fn error_count(&self, operation: &str, kind: &str) -> u64 {
        self.errors.with_label_values(&[operation, kind]).get()
    }

    /// Prometheus text exposition of every registered metric.
    pub fn gather(&self) -> KeeperResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| KeeperError::Metrics(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
