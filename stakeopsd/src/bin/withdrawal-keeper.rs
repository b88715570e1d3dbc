//! StakeOps withdrawal-keeper
//!
//! Claims ready withdrawals and keeps the liquidity buffer topped up.
//!
//! # Usage
//!
//! ```bash
//! STAKEOPS_ENV=development STAKEOPS_METRICS_PORT=9090 cargo run -p stakeopsd --bin withdrawal-keeper
//! ```

use stakeopsd::ProcessKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stakeopsd::run_main(ProcessKind::WithdrawalKeeper).await?;
    Ok(())
}
