//! Liquidity Manager
//!
//! Reads the liquidity buffer and requests unstakes to refill it.

use std::time::Instant;
use tracing::{error, info};

use stakeops_chain::{methods, write_with_retry, ChainValue};
use stakeops_domain::{format_amount, Amount};

use crate::context::KeeperContext;
use crate::error::{KeeperError, KeeperResult};
use crate::metrics::amount_gauge_value;

/// Manages the liquidity buffer held for withdrawal claims.
pub struct LiquidityManager {
    ctx: KeeperContext,
    min_buffer: Amount,
}

impl LiquidityManager {
    /// Create a manager enforcing `min_buffer`.
    pub fn new(ctx: KeeperContext, min_buffer: Amount) -> Self {
        Self { ctx, min_buffer }
    }

    /// Configured minimum buffer.
    pub fn min_buffer(&self) -> Amount {
        self.min_buffer
    }

    /// Current buffer balance.
    pub async fn get_buffer_balance(&self) -> KeeperResult<Amount> {
        let balance = self
            .ctx
            .chain
            .read_uint(&self.ctx.addresses.vault, methods::GET_LIQUIDITY_BUFFER, &[])
            .await?;

        self.ctx.metrics.liquidity_buffer.set(amount_gauge_value(balance));
        Ok(balance)
    }

    /// Whether the buffer is at or above the configured minimum.
    pub async fn check_min_buffer_maintained(&self) -> KeeperResult<bool> {
        Ok(self.get_buffer_balance().await? >= self.min_buffer)
    }

    /// Ask the vault to unstake `amount` into the buffer. Returns the tx hash.
    pub async fn request_unstake(&self, amount: Amount) -> KeeperResult<String> {
        let started = Instant::now();

        let result = write_with_retry(
            self.ctx.chain.as_ref(),
            &self.ctx.retry,
            &self.ctx.addresses.vault,
            methods::REQUEST_UNSTAKE,
            &[ChainValue::Uint(amount)],
        )
        .await;

        match result {
            Ok(receipt) => {
                self.ctx
                    .metrics
                    .observe_tx(methods::REQUEST_UNSTAKE, started.elapsed());
                info!(
                    amount = %format_amount(amount),
                    tx_hash = %receipt.tx_hash,
                    "Unstake requested"
                );
                Ok(receipt.tx_hash)
            }
            Err(e) => {
                let e = KeeperError::from(e);
                self.ctx.metrics.record_error(methods::REQUEST_UNSTAKE, &e);
                error!(amount = %format_amount(amount), error = %e, "Unstake request failed");
                Err(e)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
