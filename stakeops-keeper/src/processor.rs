//! Withdrawal Processor
//!
//! One cycle:
//!
//! ```text
//! QueueMonitor → ready requests ─(none)→ 0
//!                     │
//!                     ▼
//!          ensure_liquidity(total needed)   one unstake for the shortfall
//!                     │
//!                     ▼
//!          claim each request independently  failures logged, batch continues
//! ```
//!
//! The unstake is not awaited to settle. Claims that outrun it fail and are
//! picked up on a later cycle.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{info, warn};

use stakeops_chain::{methods, now_arg, write_with_retry, ChainValue};
use stakeops_domain::{format_amount, Amount, RequestId};

use crate::context::KeeperContext;
use crate::error::{KeeperError, KeeperResult};
use crate::liquidity::LiquidityManager;
use crate::queue::QueueMonitor;

/// Outcome of one processing cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalReport {
    /// Requests ready at the start of the cycle
    pub ready: usize,
    /// Requests claimed successfully
    pub processed: usize,
    /// Requests whose claim failed
    pub failed: Vec<RequestId>,
    /// Shortfall sent to `request_unstake`, if any
    pub unstake_requested: Option<Amount>,
}

/// Claims ready withdrawals after making sure the buffer can cover them.
pub struct WithdrawalProcessor {
    ctx: KeeperContext,
    queue: QueueMonitor,
    liquidity: LiquidityManager,
}

impl WithdrawalProcessor {
    /// Create a processor.
    pub fn new(ctx: KeeperContext, queue: QueueMonitor, liquidity: LiquidityManager) -> Self {
        Self {
            ctx,
            queue,
            liquidity,
        }
    }

    /// Liquidity manager used by this processor.
    pub fn liquidity(&self) -> &LiquidityManager {
        &self.liquidity
    }

    /// Process every ready request. Returns the number claimed.
    pub async fn process_ready_withdrawals(&self) -> KeeperResult<usize> {
        Ok(self.process_cycle(Utc::now()).await?.processed)
    }

    /// Run one cycle as of `now` and report what happened.
    pub async fn process_cycle(&self, now: DateTime<Utc>) -> KeeperResult<WithdrawalReport> {
        let status = self.queue.get_queue_status_at(now).await?;

        if status.ready_to_claim.is_empty() {
            return Ok(WithdrawalReport::default());
        }

        let total_needed = status.total_ready();
        let unstake_requested = self.ensure_liquidity(total_needed).await?;

        let mut report = WithdrawalReport {
            ready: status.ready_to_claim.len(),
            unstake_requested,
            ..WithdrawalReport::default()
        };

        for request in &status.ready_to_claim {
            match self.claim(request.id, now).await {
                Ok(tx_hash) => {
                    report.processed += 1;
                    self.ctx.metrics.withdrawals_processed.inc();
                    info!(
                        request_id = request.id,
                        amount = %format_amount(request.amount),
                        tx_hash = %tx_hash,
                        "Withdrawal claimed"
                    );
                }
                Err(e) => {
                    self.ctx.metrics.record_error(methods::CLAIM_WITHDRAWAL, &e);
                    warn!(request_id = request.id, error = %e, "Withdrawal claim failed");
                    report.failed.push(request.id);
                }
            }
        }

        info!(
            processed = report.processed,
            failed = report.failed.len(),
            "Withdrawal cycle complete"
        );
        Ok(report)
    }

    /// Request an unstake for any shortfall between the buffer and `total_needed`.
    ///
    /// Returns the requested amount, or `None` when the buffer already covers it.
    pub async fn ensure_liquidity(&self, total_needed: Amount) -> KeeperResult<Option<Amount>> {
        let buffer = self.liquidity.get_buffer_balance().await?;

        if buffer >= total_needed {
            return Ok(None);
        }

        let shortfall = total_needed - buffer;
        info!(
            needed = %format_amount(total_needed),
            buffer = %format_amount(buffer),
            shortfall = %format_amount(shortfall),
            "Buffer short, requesting unstake"
        );
        self.liquidity.request_unstake(shortfall).await?;
        Ok(Some(shortfall))
    }

    async fn claim(&self, id: RequestId, now: DateTime<Utc>) -> KeeperResult<String> {
        let started = Instant::now();
        let receipt = write_with_retry(
            self.ctx.chain.as_ref(),
            &self.ctx.retry,
            &self.ctx.addresses.queue,
            methods::CLAIM_WITHDRAWAL,
            &[ChainValue::from(id), now_arg(now)],
        )
        .await
        .map_err(KeeperError::from)?;

        self.ctx
            .metrics
            .observe_tx(methods::CLAIM_WITHDRAWAL, started.elapsed());
        Ok(receipt.tx_hash)
    }
}

// =============================================================================
// Tests
// =============================================================================
