//! Retry executor with exponential backoff and jitter.
//!
//! Every chain write goes through [`with_retry`]. The executor does not
//! deduplicate side effects: a write that landed before a transport timeout
//! may be submitted again, so callers own idempotency.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use stakeops_domain::Address;

use crate::error::ChainResult;
use crate::ports::{ChainPort, ChainValue, TxReceipt};

// =============================================================================
// Policy
// =============================================================================

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt (doubles every attempt)
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Upper bound of the uniform random jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
            max_jitter: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    /// Policy without delays, for tests and simulations.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay after failed attempt `attempt` (1-based), jitter excluded.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay after failed attempt `attempt`: `min(backoff + jitter, max_delay)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };

        self.backoff(attempt)
            .saturating_add(jitter)
            .min(self.max_delay)
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Run `operation` up to `policy.max_attempts` times.
///
/// `on_retry(error, attempt)` is called before each sleep. The last error is
/// returned once attempts are exhausted.
pub async fn with_retry<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(&E, u32),
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                on_retry(&e, attempt);
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Submit a contract write through [`with_retry`], logging each retry.
///
/// Reverted receipts count as failures and are retried.
pub async fn write_with_retry(
    chain: &dyn ChainPort,
    policy: &RetryPolicy,
    address: &Address,
    method: &str,
    args: &[ChainValue],
) -> ChainResult<TxReceipt> {
    with_retry(
        policy,
        || async move { chain.write_contract(address, method, args).await?.ensure_success() },
        |e, attempt| {
            warn!(
                method,
                attempt,
                max_attempts = policy.max_attempts,
                error = %e,
                "Contract write failed, retrying"
            );
        },
    )
    .await
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let mut retries = Vec::new();

        let result = with_retry(
            &policy,
            || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(Boom(n))
                    } else {
                        Ok("done")
                    }
                }
            },
            |e: &Boom, attempt| retries.push((e.0, attempt)),
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries, vec![(1, 1), (2, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_propagates_last_error() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let mut retry_count = 0;

        let result: Result<(), Boom> = with_retry(
            &policy,
            || {
                let calls = calls.clone();
                async move { Err(Boom(calls.fetch_add(1, Ordering::SeqCst) + 1)) }
            },
            |_, _| retry_count += 1,
        )
        .await;

        assert_eq!(result, Err(Boom(3)));
        assert_eq!(retry_count, 2);
    }

    #[tokio::test]
    async fn test_first_success_skips_on_retry() {
        let mut retry_count = 0;
        let result: Result<u8, Boom> = with_retry(
            &RetryPolicy::immediate(3),
            || async { Ok(1) },
            |_, _| retry_count += 1,
        )
        .await;

        assert_eq!(result, Ok(1));
        assert_eq!(retry_count, 0);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), Boom> = with_retry(
            &RetryPolicy::immediate(0),
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Boom(0))
            },
            |_, _| {},
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4_000));
    }

    #[test]
    fn test_delay_is_capped_and_jittered() {
        let policy = RetryPolicy::default();

        for _ in 0..50 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(1_000));
            assert!(d <= Duration::from_millis(2_000));
        }

        assert_eq!(policy.delay_for(10), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(64), Duration::from_millis(30_000));
    }
}
