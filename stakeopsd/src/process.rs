//! Polling loop shared by the keeper processes.
//!
//! Every process runs one cycle immediately, then alternates between
//! sleeping for the polling interval and running the next cycle. A failed
//! cycle is logged and the loop keeps going; only cancellation stops it.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::api::HealthProbe;
use crate::error::DaemonResult;

/// A long-running keeper process.
#[async_trait]
pub trait KeeperProcess: HealthProbe {
    /// Process name used in logs.
    fn name(&self) -> &'static str;

    /// One-time setup before the first cycle (e.g. event subscriptions).
    async fn start(&self) -> DaemonResult<()> {
        Ok(())
    }

    /// One polling cycle.
    async fn run_cycle(&self) -> DaemonResult<()>;

    /// Release resources on shutdown. Must tolerate `start` never having run.
    async fn shutdown(&self) {}
}

/// Drive `process` until `shutdown` is cancelled.
///
/// An in-flight cycle is abandoned at its next await point on cancellation.
pub async fn run_loop<P>(process: &P, interval: Duration, shutdown: CancellationToken)
where
    P: KeeperProcess + ?Sized,
{
    info!(
        process = process.name(),
        interval_ms = interval.as_millis() as u64,
        "Entering polling loop"
    );

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            result = process.run_cycle() => match result {
                Ok(()) => debug!(process = process.name(), "Cycle complete"),
                Err(e) => error!(process = process.name(), error = %e, "Cycle failed"),
            },
        }

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(process = process.name(), "Polling loop stopped");
}

// =============================================================================
// Tests
// =============================================================================
