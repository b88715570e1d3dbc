//! StakeOps staking-keeper
//!
//! Watches deposits and stakes full batches.
//!
//! # Usage
//!
//! ```bash
//! STAKEOPS_ENV=development STAKEOPS_METRICS_PORT=9090 cargo run -p stakeopsd --bin staking-keeper
//! ```

use stakeopsd::ProcessKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stakeopsd::run_main(ProcessKind::StakingKeeper).await?;
    Ok(())
}
