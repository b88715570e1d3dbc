//! Shared handles passed to every keeper component.

use std::sync::Arc;

use stakeops_chain::{ChainPort, ContractAddresses, RetryPolicy};

use crate::metrics::KeeperMetrics;

/// Chain port, contract addresses, metrics, and write retry policy.
#[derive(Clone)]
pub struct KeeperContext {
    /// Chain facade
    pub chain: Arc<dyn ChainPort>,
    /// Protocol contract addresses
    pub addresses: ContractAddresses,
    /// Process metrics
    pub metrics: Arc<KeeperMetrics>,
    /// Retry policy applied to every write
    pub retry: RetryPolicy,
}

impl KeeperContext {
    /// Create a context with the default retry policy.
    pub fn new(
        chain: Arc<dyn ChainPort>,
        addresses: ContractAddresses,
        metrics: Arc<KeeperMetrics>,
    ) -> Self {
        Self {
            chain,
            addresses,
            metrics,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the write retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
