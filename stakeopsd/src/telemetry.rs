//! Tracing setup shared by the keeper binaries.

use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{DaemonError, DaemonResult};

/// Crates logged at `info` unless `RUST_LOG` says otherwise
const DEFAULT_DIRECTIVES: &[&str] = &[
    "stakeopsd=info",
    "stakeops_keeper=info",
    "stakeops_alerts=info",
    "stakeops_chain=info",
];

/// Install the global subscriber.
///
/// `STAKEOPS_LOG_JSON=true` switches to JSON lines.
pub fn init_tracing() -> DaemonResult<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        let parsed = directive
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid log directive {}: {}", directive, e)))?;
        filter = filter.add_directive(parsed);
    }

    let json = env::var("STAKEOPS_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .try_init()
        .map_err(|e| DaemonError::Config(format!("Failed to initialise tracing: {}", e)))
}
