//! Polled state snapshots for the Stakeops Domain
//!
//! These are recomputed by the keepers on every poll cycle. None of them is
//! persisted; a restart starts from empty state.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_objects::{to_units, Address, Amount, DomainError};

/// Identifier of a withdrawal request (index into the on-chain queue).
pub type RequestId = u64;

// =============================================================================
// Validator Status
// =============================================================================

/// Last observed state of a single validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorStatus {
    /// Validator address
    pub address: Address,
    /// Whether the registry reports the validator as active
    pub is_active: bool,
    /// Stake currently delegated to the validator
    pub stake: Amount,
    /// When the status was read
    pub last_checked: DateTime<Utc>,
}

// =============================================================================
// TVL
// =============================================================================

/// Total value locked, split into its three buckets.
///
/// `staked_to_validators` is never fetched; it is derived as
/// `total - pending_pool - liquidity_buffer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvlData {
    /// Deposits not yet allocated to a validator
    pub pending_pool: Amount,
    /// Funds delegated to validators (derived)
    pub staked_to_validators: Amount,
    /// Unstaked funds held back for withdrawal claims
    pub liquidity_buffer: Amount,
    /// Total value locked
    pub total: Amount,
    /// Total valued at the configured asset price
    pub total_usd: f64,
}

impl TvlData {
    /// Derive a TVL snapshot from the three fetched values.
    ///
    /// # Errors
    /// Returns `DomainError::InconsistentTvl` when `pending_pool + liquidity_buffer`
    /// exceeds `total`.
    pub fn derive(
        total: Amount,
        pending_pool: Amount,
        liquidity_buffer: Amount,
        asset_price_usd: Decimal,
    ) -> Result<Self, DomainError> {
        let staked_to_validators = total
            .checked_sub(pending_pool)
            .and_then(|rest| rest.checked_sub(liquidity_buffer))
            .ok_or_else(|| {
                DomainError::InconsistentTvl(format!(
                    "pending pool {} + liquidity buffer {} exceeds total {}",
                    pending_pool, liquidity_buffer, total
                ))
            })?;

        Ok(Self {
            pending_pool,
            staked_to_validators,
            liquidity_buffer,
            total,
            total_usd: value_usd(total, asset_price_usd),
        })
    }
}

/// Value an amount at a fixed USD price.
fn value_usd(amount: Amount, price: Decimal) -> f64 {
    match to_units(amount) {
        Ok(units) => (units * price).to_f64().unwrap_or(f64::MAX),
        // Precision no longer matters at this magnitude
        Err(_) => amount as f64 / 1e18 * price.to_f64().unwrap_or(0.0),
    }
}

// =============================================================================
// Withdrawal Queue
// =============================================================================

/// A withdrawal request whose unbonding period has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableRequest {
    /// Request identifier
    pub id: RequestId,
    /// Amount owed to the requester
    pub amount: Amount,
}

/// Aggregated view of the withdrawal queue for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Number of requests in the queue
    pub queue_length: u64,
    /// Sum of amounts of every successfully read request
    pub total_pending: Amount,
    /// Requests that can be claimed now
    pub ready_to_claim: Vec<ClaimableRequest>,
}

impl QueueStatus {
    /// Identifiers of the claimable requests
    pub fn ready_ids(&self) -> Vec<RequestId> {
        self.ready_to_claim.iter().map(|r| r.id).collect()
    }

    /// Sum of the claimable amounts
    pub fn total_ready(&self) -> Amount {
        self.ready_to_claim
            .iter()
            .fold(0, |acc: Amount, r| acc.saturating_add(r.amount))
    }
}

// =============================================================================
// Tests
// =============================================================================
