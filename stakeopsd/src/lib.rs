//! StakeOps keeper runtime
//!
//! Wires the keeper components into three long-running processes, each with
//! its own health/metrics server.
//!
//! # Architecture
//!
//! ```text
//! staking-keeper:    Deposit events ─┐
//!                    Polling loop ───┴→ DepositWatcher → BatchStaker → StakingExecutor
//!
//! withdrawal-keeper: Polling loop → WithdrawalProcessor → LiquidityManager / claims
//!
//! monitor:           Polling loop → TvlTracker, ValidatorHealthChecker
//!
//! all:               Alerter → AlertDispatcher → Telegram / Slack / PagerDuty
//!                    API (/health, /metrics, /alerts)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use stakeopsd::{Config, Daemon, ProcessKind};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let daemon = Daemon::new_simulated(Config::from_env()?)?;
//!     daemon.run(ProcessKind::Monitor, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod alerting;
pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod monitor;
pub mod process;
pub mod shutdown;
pub mod staking_keeper;
pub mod telemetry;
pub mod withdrawal_keeper;

// Re-exports for convenience
pub use alerting::{build_dispatcher, Alerter};
pub use api::{create_router, ApiState, HealthProbe, HealthResponse};
pub use config::{AlertConfig, ApiConfig, Config, Environment, KeeperConfig, TelegramConfig};
pub use daemon::{Daemon, ProcessKind};
pub use error::{DaemonError, DaemonResult};
pub use monitor::Monitor;
pub use process::{run_loop, KeeperProcess};
pub use staking_keeper::{BatchStaker, StakingKeeper};
pub use withdrawal_keeper::WithdrawalKeeper;

/// Entry point shared by the keeper binaries.
///
/// Loads configuration, installs tracing and signal handlers, then runs
/// `kind` until SIGINT/SIGTERM.
pub async fn run_main(kind: ProcessKind) -> DaemonResult<()> {
    telemetry::init_tracing()?;

    let config = Config::from_env()?;
    tracing::info!(
        process = %kind,
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        "StakeOps keeper"
    );

    let shutdown = tokio_util::sync::CancellationToken::new();
    shutdown::spawn_signal_handler(shutdown.clone());

    Daemon::new_simulated(config)?.run(kind, shutdown).await
}
