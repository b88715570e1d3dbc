//! Staking Executor
//!
//! Submits the pending pool to the next validator chosen by the registry.

use std::time::Instant;
use tracing::{error, info, warn};

use stakeops_chain::{methods, write_with_retry, ChainValue};
use stakeops_domain::Address;

use crate::context::KeeperContext;
use crate::error::KeeperResult;

/// Validator used when the registry returns no selection.
pub fn placeholder_validator() -> Address {
    Address::from_low_u64(1)
}

/// Executes batch stakes.
pub struct StakingExecutor {
    ctx: KeeperContext,
}

impl StakingExecutor {
    /// Create a staking executor.
    pub fn new(ctx: KeeperContext) -> Self {
        Self { ctx }
    }

    /// Validator the next batch will be delegated to.
    pub async fn select_validator(&self) -> KeeperResult<Address> {
        let selected = self
            .ctx
            .chain
            .read_address(&self.ctx.addresses.registry, methods::SELECT_NEXT_VALIDATOR, &[])
            .await?;

        Ok(selected.unwrap_or_else(|| {
            let fallback = placeholder_validator();
            warn!(validator = %fallback, "Registry returned no validator, using placeholder");
            fallback
        }))
    }

    /// Stake the pending pool. Returns the transaction hash.
    ///
    /// The write is retried per the context's policy; once retries are
    /// exhausted the error is counted and returned.
    pub async fn execute_batch_stake(&self) -> KeeperResult<String> {
        let result = self.submit().await;

        if let Err(e) = &result {
            self.ctx.metrics.record_error(methods::EXECUTE_BATCH_STAKE, e);
            error!(error = %e, "Batch stake failed");
        }
        result
    }

    async fn submit(&self) -> KeeperResult<String> {
        let validator = self.select_validator().await?;
        let started = Instant::now();

        let receipt = write_with_retry(
            self.ctx.chain.as_ref(),
            &self.ctx.retry,
            &self.ctx.addresses.core,
            methods::EXECUTE_BATCH_STAKE,
            &[ChainValue::Address(validator.clone())],
        )
        .await?;

        self.ctx
            .metrics
            .observe_tx(methods::EXECUTE_BATCH_STAKE, started.elapsed());
        self.ctx.metrics.batches_processed.inc();

        info!(
            validator = %validator,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            "Batch stake executed"
        );
        Ok(receipt.tx_hash)
    }
}

// =============================================================================
// Tests
// =============================================================================
