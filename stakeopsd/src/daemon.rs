//! Daemon: runtime for a single keeper process.
//!
//! # Lifecycle
//!
//! 1. Connect to the chain (failure aborts startup)
//! 2. Start the health/metrics server
//! 3. Start the process (subscriptions)
//! 4. Polling loop until SIGINT/SIGTERM
//! 5. Shut the process down and stop the server

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use stakeops_alerts::{AlertDispatcher, HttpTransport, WebhookTransport};
use stakeops_chain::{ChainPort, SimulatedChain};
use stakeops_keeper::{KeeperContext, KeeperMetrics};

use crate::alerting::{build_dispatcher, Alerter};
use crate::api::{create_router, ApiState, HealthProbe};
use crate::config::{Config, Environment};
use crate::error::{DaemonError, DaemonResult};
use crate::monitor::Monitor;
use crate::process::{run_loop, KeeperProcess};
use crate::staking_keeper::StakingKeeper;
use crate::withdrawal_keeper::WithdrawalKeeper;

// =============================================================================
// Process Kind
// =============================================================================

/// Which keeper a binary runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    /// Deposit watcher and batch staker
    StakingKeeper,
    /// Withdrawal claims and liquidity buffer
    WithdrawalKeeper,
    /// TVL, exchange rate and validator monitoring
    Monitor,
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessKind::StakingKeeper => write!(f, "staking-keeper"),
            ProcessKind::WithdrawalKeeper => write!(f, "withdrawal-keeper"),
            ProcessKind::Monitor => write!(f, "monitor"),
        }
    }
}

// =============================================================================
// Daemon
// =============================================================================

/// Shared wiring for the keeper processes.
pub struct Daemon {
    config: Config,
    chain: Arc<dyn ChainPort>,
    metrics: Arc<KeeperMetrics>,
    dispatcher: Arc<AlertDispatcher>,
}

impl Daemon {
    /// Create a daemon over the given chain and webhook transport.
    pub fn new(
        config: Config,
        chain: Arc<dyn ChainPort>,
        transport: Arc<dyn WebhookTransport>,
    ) -> DaemonResult<Self> {
        let metrics = Arc::new(KeeperMetrics::new()?);
        let dispatcher = Arc::new(build_dispatcher(&config.alerts, transport));

        Ok(Self {
            config,
            chain,
            metrics,
            dispatcher,
        })
    }

    /// Create a daemon over the in-memory protocol, seeded with the
    /// configured validators, alerting over HTTP.
    ///
    /// Refused in production, where no chain adapter ships with this crate.
    pub fn new_simulated(config: Config) -> DaemonResult<Self> {
        if config.environment == Environment::Production {
            return Err(DaemonError::Config(
                "no chain adapter for production; the simulated chain runs only in test and development"
                    .to_string(),
            ));
        }
        warn!(environment = %config.environment, "Using the simulated chain");

        let chain = SimulatedChain::new(config.addresses.clone());
        for validator in &config.keeper.validators {
            chain.add_validator(validator.clone(), true, 0);
        }

        Self::new(config, Arc::new(chain), Arc::new(HttpTransport::new()))
    }

    /// Configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Process metrics.
    pub fn metrics(&self) -> &Arc<KeeperMetrics> {
        &self.metrics
    }

    /// Alert dispatcher.
    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    /// Context shared by the keeper components.
    pub fn context(&self) -> KeeperContext {
        KeeperContext::new(
            self.chain.clone(),
            self.config.addresses.clone(),
            self.metrics.clone(),
        )
    }

    /// Alert handle that records alert metrics.
    pub fn alerter(&self) -> Alerter {
        Alerter::new(self.dispatcher.clone(), self.metrics.clone())
    }

    /// Build the staking keeper.
    pub fn staking_keeper(&self) -> StakingKeeper {
        StakingKeeper::new(self.context(), self.config.keeper.batch_threshold, self.alerter())
    }

    /// Build the withdrawal keeper.
    pub fn withdrawal_keeper(&self) -> WithdrawalKeeper {
        WithdrawalKeeper::new(
            self.context(),
            self.config.keeper.min_liquidity_buffer,
            self.alerter(),
        )
    }

    /// Build the monitor.
    pub fn monitor(&self) -> Monitor {
        Monitor::new(
            self.context(),
            self.config.keeper.asset_price_usd,
            self.config.keeper.tvl_drop_threshold_percent,
            self.config.keeper.validators.clone(),
            self.alerter(),
        )
    }

    /// Connect to the configured RPC endpoint.
    pub async fn connect(&self) -> DaemonResult<()> {
        self.chain.connect(&self.config.rpc_url).await?;
        info!(rpc_url = %self.config.rpc_url, "Connected to chain");
        Ok(())
    }

    /// Connect, then run `kind` until `shutdown` is cancelled.
    pub async fn run(&self, kind: ProcessKind, shutdown: CancellationToken) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            process = %kind,
            "Starting keeper"
        );

        self.connect().await?;

        match kind {
            ProcessKind::StakingKeeper => self.run_process(Arc::new(self.staking_keeper()), shutdown).await,
            ProcessKind::WithdrawalKeeper => {
                self.run_process(Arc::new(self.withdrawal_keeper()), shutdown).await
            }
            ProcessKind::Monitor => self.run_process(Arc::new(self.monitor()), shutdown).await,
        }
    }

    /// Serve health for `process` and drive it until `shutdown` is cancelled.
    pub async fn run_process<P>(&self, process: Arc<P>, shutdown: CancellationToken) -> DaemonResult<()>
    where
        P: KeeperProcess + 'static,
    {
        // Stops the server on every exit path
        let server_token = shutdown.child_token();
        let _server_guard = server_token.clone().drop_guard();

        let api_addr = self.start_api_server(process.clone(), server_token).await?;
        info!(%api_addr, "API server started");

        if let Err(e) = process.start().await {
            error!(process = process.name(), error = %e, "Failed to start process");
            process.shutdown().await;
            return Err(e);
        }

        run_loop(process.as_ref(), self.config.keeper.polling_interval, shutdown).await;

        process.shutdown().await;
        info!(process = process.name(), "Keeper stopped");
        Ok(())
    }

    /// Start the API server. Returns the bound address.
    pub async fn start_api_server(
        &self,
        probe: Arc<dyn HealthProbe>,
        shutdown: CancellationToken,
    ) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState::new(probe, self.metrics.clone(), self.dispatcher.clone()));

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Server(format!("Failed to get local address: {}", e)))?;

        tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_chain_refused_in_production() {
        let mut config = Config::test();
        config.environment = Environment::Production;

        let err = Daemon::new_simulated(config).err().unwrap();
        assert!(matches!(err, DaemonError::Config(ref msg) if msg.contains("production")));
    }

    #[test]
    fn test_simulated_chain_allowed_outside_production() {
        assert!(Daemon::new_simulated(Config::test()).is_ok());

        let mut config = Config::test();
        config.environment = Environment::Development;
        assert!(Daemon::new_simulated(config).is_ok());
    }
}
