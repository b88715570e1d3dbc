//! StakeOps monitor
//!
//! Tracks TVL, the exchange rate and validator health.
//!
//! # Usage
//!
//! ```bash
//! STAKEOPS_ENV=development STAKEOPS_METRICS_PORT=9090 cargo run -p stakeopsd --bin monitor
//! ```

use stakeopsd::ProcessKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stakeopsd::run_main(ProcessKind::Monitor).await?;
    Ok(())
}
