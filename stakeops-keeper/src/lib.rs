//! Stakeops Keeper Layer
//!
//! Trackers and executors shared by the three keeper processes.
//!
//! # Architecture
//!
//! ```text
//! Staking:     DepositWatcher ─→ BatchReadyHandler ─→ StakingExecutor
//! Withdrawal:  QueueMonitor + LiquidityManager ─→ WithdrawalProcessor
//! Monitoring:  TvlTracker, ValidatorHealthChecker
//!                      │
//!                      ▼
//!              KeeperContext (ChainPort, addresses, KeeperMetrics, RetryPolicy)
//! ```
//!
//! Components never raise alerts; the process loops decide what to report.

#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod gate;
pub mod liquidity;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod staking;
pub mod tvl;
pub mod validators;
pub mod watcher;

// Re-exports for convenience
pub use context::KeeperContext;
pub use error::{KeeperError, KeeperResult};
pub use gate::{BatchGate, GateGuard};
pub use liquidity::LiquidityManager;
pub use metrics::{amount_gauge_value, KeeperMetrics};
pub use processor::{WithdrawalProcessor, WithdrawalReport};
pub use queue::QueueMonitor;
pub use staking::{placeholder_validator, StakingExecutor};
pub use tvl::{TvlTracker, PARITY_EXCHANGE_RATE_BPS};
pub use validators::{ValidatorHealthChecker, ValidatorSummary};
pub use watcher::{BatchReadyHandler, DepositWatcher};
