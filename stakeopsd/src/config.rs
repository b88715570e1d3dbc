//! Process configuration.
//!
//! Loaded once from environment variables at startup and never reloaded.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use stakeops_chain::ContractAddresses;
use stakeops_domain::{Address, Amount, WEI_PER_UNIT};

use crate::error::{DaemonError, DaemonResult};

/// Default batch threshold: 200,000 units
pub const DEFAULT_BATCH_THRESHOLD: Amount = 200_000 * WEI_PER_UNIT;

/// Default minimum liquidity buffer: 100 units
pub const DEFAULT_MIN_LIQUIDITY_BUFFER: Amount = 100 * WEI_PER_UNIT;

/// Default polling interval in milliseconds
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 30_000;

// =============================================================================
// Configuration
// =============================================================================

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (test, development, production)
    pub environment: Environment,
    /// RPC endpoint
    pub rpc_url: String,
    /// Protocol contract addresses
    pub addresses: ContractAddresses,
    /// Keeper thresholds and intervals
    pub keeper: KeeperConfig,
    /// Health and metrics listener
    pub api: ApiConfig,
    /// Notification channel credentials
    pub alerts: AlertConfig,
}

/// Keeper thresholds and intervals.
#[derive(Debug, Clone)]
pub struct KeeperConfig {
    /// Pending pool size that triggers a batch stake
    pub batch_threshold: Amount,
    /// Time between polling cycles
    pub polling_interval: Duration,
    /// Buffer level below which the withdrawal keeper reports unhealthy
    pub min_liquidity_buffer: Amount,
    /// TVL drop (percent, positive) that raises a critical alert
    pub tvl_drop_threshold_percent: f64,
    /// Configured asset price used for USD valuation
    pub asset_price_usd: Decimal,
    /// Validators checked by the monitor
    pub validators: Vec<Address>,
}

/// Health and metrics listener.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

/// Telegram credentials.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token
    pub bot_token: String,
    /// Destination chat
    pub chat_id: String,
}

/// Optional notification channels.
#[derive(Debug, Clone, Default)]
pub struct AlertConfig {
    /// Telegram bot (token and chat id both required)
    pub telegram: Option<TelegramConfig>,
    /// Slack incoming webhook URL
    pub slack_webhook_url: Option<String>,
    /// PagerDuty Events v2 routing key
    pub pagerduty_routing_key: Option<String>,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment (fixture addresses allowed)
    Development,
    /// Production environment (addresses required)
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let loader = Loader { lookup };

        let environment = loader.environment()?;
        let rpc_url = match loader.get("STAKEOPS_RPC_URL") {
            Some(url) => url,
            None if environment == Environment::Production => {
                return Err(DaemonError::Config("STAKEOPS_RPC_URL is required in production".to_string()))
            }
            None => "http://127.0.0.1:8545".to_string(),
        };

        Ok(Self {
            environment,
            rpc_url,
            addresses: loader.addresses(environment)?,
            keeper: loader.keeper()?,
            api: loader.api()?,
            alerts: loader.alerts(),
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            rpc_url: "sim://test".to_string(),
            addresses: ContractAddresses::fixture(),
            keeper: KeeperConfig {
                batch_threshold: DEFAULT_BATCH_THRESHOLD,
                polling_interval: Duration::from_millis(10),
                min_liquidity_buffer: DEFAULT_MIN_LIQUIDITY_BUFFER,
                tvl_drop_threshold_percent: 10.0,
                asset_price_usd: Decimal::ONE,
                validators: Vec::new(),
            },
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            alerts: AlertConfig::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            rpc_url: "http://127.0.0.1:8545".to_string(),
            addresses: ContractAddresses::fixture(),
            keeper: KeeperConfig {
                batch_threshold: DEFAULT_BATCH_THRESHOLD,
                polling_interval: Duration::from_millis(DEFAULT_POLLING_INTERVAL_MS),
                min_liquidity_buffer: DEFAULT_MIN_LIQUIDITY_BUFFER,
                tvl_drop_threshold_percent: 10.0,
                asset_price_usd: Decimal::ONE,
                validators: Vec::new(),
            },
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 9090,
            },
            alerts: AlertConfig::default(),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Loader
// =============================================================================

struct Loader<F> {
    lookup: F,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn environment(&self) -> DaemonResult<Environment> {
        let env_str = self
            .get("STAKEOPS_ENV")
            .unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid STAKEOPS_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn addresses(&self, environment: Environment) -> DaemonResult<ContractAddresses> {
        let fixture = ContractAddresses::fixture();

        Ok(ContractAddresses {
            core: self.address("STAKEOPS_CORE_ADDRESS", environment, fixture.core)?,
            registry: self.address("STAKEOPS_REGISTRY_ADDRESS", environment, fixture.registry)?,
            queue: self.address("STAKEOPS_QUEUE_ADDRESS", environment, fixture.queue)?,
            vault: self.address("STAKEOPS_VAULT_ADDRESS", environment, fixture.vault)?,
        })
    }

    fn address(&self, key: &str, environment: Environment, fallback: Address) -> DaemonResult<Address> {
        match self.get(key) {
            Some(val) => Address::parse(&val)
                .map_err(|e| DaemonError::Config(format!("Invalid {}: {}", key, e))),
            None if environment == Environment::Production => {
                Err(DaemonError::Config(format!("{} is required in production", key)))
            }
            None => Ok(fallback),
        }
    }

    fn keeper(&self) -> DaemonResult<KeeperConfig> {
        let polling_ms = self.parsed("STAKEOPS_POLLING_INTERVAL_MS", DEFAULT_POLLING_INTERVAL_MS)?;
        if polling_ms == 0 {
            return Err(DaemonError::Config(
                "STAKEOPS_POLLING_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        let tvl_drop_threshold_percent = self.parsed("STAKEOPS_TVL_DROP_THRESHOLD_PERCENT", 10.0f64)?;
        if !tvl_drop_threshold_percent.is_finite() || tvl_drop_threshold_percent < 0.0 {
            return Err(DaemonError::Config(format!(
                "Invalid STAKEOPS_TVL_DROP_THRESHOLD_PERCENT value: {}",
                tvl_drop_threshold_percent
            )));
        }

        let asset_price_usd = match self.get("STAKEOPS_ASSET_PRICE_USD") {
            Some(val) => Decimal::from_str(&val).map_err(|_| {
                DaemonError::Config(format!("Invalid STAKEOPS_ASSET_PRICE_USD value: {}", val))
            })?,
            None => Decimal::ONE,
        };

        let validators = match self.get("STAKEOPS_VALIDATORS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    Address::parse(s)
                        .map_err(|e| DaemonError::Config(format!("Invalid STAKEOPS_VALIDATORS entry: {}", e)))
                })
                .collect::<DaemonResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(KeeperConfig {
            batch_threshold: self.parsed("STAKEOPS_BATCH_THRESHOLD", DEFAULT_BATCH_THRESHOLD)?,
            polling_interval: Duration::from_millis(polling_ms),
            min_liquidity_buffer: self.parsed("STAKEOPS_MIN_LIQUIDITY_BUFFER", DEFAULT_MIN_LIQUIDITY_BUFFER)?,
            tvl_drop_threshold_percent,
            asset_price_usd,
            validators,
        })
    }

    fn api(&self) -> DaemonResult<ApiConfig> {
        Ok(ApiConfig {
            host: self
                .get("STAKEOPS_METRICS_HOST")
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: self.parsed("STAKEOPS_METRICS_PORT", 9090u16)?,
        })
    }

    fn alerts(&self) -> AlertConfig {
        let telegram = match (
            self.get("STAKEOPS_TELEGRAM_BOT_TOKEN"),
            self.get("STAKEOPS_TELEGRAM_CHAT_ID"),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            _ => None,
        };

        AlertConfig {
            telegram,
            slack_webhook_url: self.get("STAKEOPS_SLACK_WEBHOOK_URL"),
            pagerduty_routing_key: self.get("STAKEOPS_PAGERDUTY_ROUTING_KEY"),
        }
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> DaemonResult<T> {
        match self.get(key) {
            Some(val) => val
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
