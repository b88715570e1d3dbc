//! Validator Health Checker
//!
//! Polls liveness and stake for a fixed validator list. Statuses are
//! overwritten in place; entries for validators that later fail to read
//! keep their last observed value.

use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use stakeops_chain::{methods, ChainValue};
use stakeops_domain::{Address, ValidatorStatus};

use crate::context::KeeperContext;
use crate::error::KeeperResult;

/// Counts from one validator check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorSummary {
    /// Validators currently active
    pub active: usize,
    /// Validators currently inactive
    pub inactive: usize,
    /// Validators whose reads failed this cycle
    pub failed: usize,
}

/// Tracks the health of a set of validators.
pub struct ValidatorHealthChecker {
    ctx: KeeperContext,
    validators: Vec<Address>,
    statuses: RwLock<BTreeMap<Address, ValidatorStatus>>,
}

impl ValidatorHealthChecker {
    /// Create a checker for `validators`.
    pub fn new(ctx: KeeperContext, validators: Vec<Address>) -> Self {
        Self {
            ctx,
            validators,
            statuses: RwLock::new(BTreeMap::new()),
        }
    }

    /// Validators being checked.
    pub fn validators(&self) -> &[Address] {
        &self.validators
    }

    /// Read every validator and update the status map.
    pub async fn check_validators(&self) -> ValidatorSummary {
        let mut failed = 0;

        for address in &self.validators {
            match self.read_status(address).await {
                Ok(status) => {
                    debug!(validator = %address, active = status.is_active, "Validator checked");
                    self.statuses.write().await.insert(address.clone(), status);
                }
                Err(e) => {
                    failed += 1;
                    self.ctx.metrics.record_error("validator_check", &e);
                    warn!(validator = %address, error = %e, "Validator check failed");
                }
            }
        }

        let statuses = self.statuses.read().await;
        let active = statuses.values().filter(|s| s.is_active).count();
        let inactive = statuses.len() - active;

        self.ctx.metrics.validators_active.set(active as i64);
        self.ctx.metrics.validators_inactive.set(inactive as i64);

        ValidatorSummary {
            active,
            inactive,
            failed,
        }
    }

    /// Every known validator currently reported inactive.
    pub async fn get_unhealthy_validators(&self) -> Vec<ValidatorStatus> {
        self.statuses
            .read()
            .await
            .values()
            .filter(|s| !s.is_active)
            .cloned()
            .collect()
    }

    /// Snapshot of every known status.
    pub async fn statuses(&self) -> Vec<ValidatorStatus> {
        self.statuses.read().await.values().cloned().collect()
    }

    async fn read_status(&self, address: &Address) -> KeeperResult<ValidatorStatus> {
        let registry = &self.ctx.addresses.registry;
        let args = [ChainValue::Address(address.clone())];

        let is_active = self
            .ctx
            .chain
            .read_bool(registry, methods::IS_ACTIVE, &args)
            .await?;
        let stake = self
            .ctx
            .chain
            .read_uint(registry, methods::GET_VALIDATOR_STAKE, &args)
            .await?;

        Ok(ValidatorStatus {
            address: address.clone(),
            is_active,
            stake,
            last_checked: Utc::now(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
