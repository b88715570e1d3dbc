//! Withdrawal Queue Monitor
//!
//! Scans the whole queue on every call. A request whose reads fail is
//! logged and left out of the cycle's totals; it is picked up again on the
//! next scan.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use stakeops_chain::{methods, now_arg, ChainError, ChainValue};
use stakeops_domain::{Amount, ClaimableRequest, QueueStatus, RequestId};

use crate::context::KeeperContext;
use crate::error::KeeperResult;
use crate::metrics::amount_gauge_value;

/// Reads the withdrawal queue.
pub struct QueueMonitor {
    ctx: KeeperContext,
}

impl QueueMonitor {
    /// Create a queue monitor.
    pub fn new(ctx: KeeperContext) -> Self {
        Self { ctx }
    }

    /// Scan the queue as of now.
    pub async fn get_queue_status(&self) -> KeeperResult<QueueStatus> {
        self.get_queue_status_at(Utc::now()).await
    }

    /// Scan the queue as of `now`.
    pub async fn get_queue_status_at(&self, now: DateTime<Utc>) -> KeeperResult<QueueStatus> {
        let queue = &self.ctx.addresses.queue;
        let raw_length = self
            .ctx
            .chain
            .read_uint(queue, methods::GET_QUEUE_LENGTH, &[])
            .await?;
        let length = u64::try_from(raw_length).map_err(|_| ChainError::Decode {
            method: methods::GET_QUEUE_LENGTH.to_string(),
            detail: format!("queue length {} does not fit in u64", raw_length),
        })?;

        let mut status = QueueStatus {
            queue_length: length,
            ..QueueStatus::default()
        };

        for id in 0..length {
            match self.read_request(id, now).await {
                Ok((claimable, amount)) => {
                    status.total_pending = status.total_pending.saturating_add(amount);
                    if claimable {
                        status.ready_to_claim.push(ClaimableRequest { id, amount });
                    }
                }
                Err(e) => {
                    self.ctx.metrics.record_error("queue_scan", &e);
                    warn!(request_id = id, error = %e, "Skipping withdrawal request");
                }
            }
        }

        debug!(
            queue_length = status.queue_length,
            ready = status.ready_to_claim.len(),
            "Withdrawal queue scanned"
        );

        let metrics = &self.ctx.metrics;
        metrics.queue_length.set(status.queue_length as i64);
        metrics.queue_ready.set(status.ready_to_claim.len() as i64);
        metrics.queue_pending.set(amount_gauge_value(status.total_pending));

        Ok(status)
    }

    async fn read_request(&self, id: RequestId, now: DateTime<Utc>) -> KeeperResult<(bool, Amount)> {
        let queue = &self.ctx.addresses.queue;
        let chain = &self.ctx.chain;

        let claimable = chain
            .read_bool(queue, methods::IS_CLAIMABLE, &[ChainValue::from(id), now_arg(now)])
            .await?;
        let amount = chain
            .read_uint(queue, methods::GET_REQUEST_AMOUNT, &[ChainValue::from(id)])
            .await?;

        Ok((claimable, amount))
    }
}

// =============================================================================
// Tests
// =============================================================================
