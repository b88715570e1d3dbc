//! Stakeops Chain Facade
//!
//! Port for contract reads, writes, and event subscriptions, plus the
//! retry executor that wraps every write.
//!
//! # Architecture
//!
//! ```text
//! Keeper → with_retry → ChainPort → (RPC transport | SimulatedChain)
//! ```
//!
//! # Components
//!
//! - **Ports**: `ChainPort` trait, call values, receipts, subscriptions
//! - **Methods**: Contract method and event names invoked by the keepers
//! - **Retry**: Exponential backoff with jitter for chain writes
//! - **Stub**: `SimulatedChain`, an in-memory protocol for development and tests
//!
//! # Example
//!
//! ```rust,ignore
//! use stakeops_chain::{ChainPort, ContractAddresses, SimulatedChain};
//!
//! let chain = SimulatedChain::new(ContractAddresses::fixture());
//! chain.connect("http://127.0.0.1:8545").await?;
//! let pool = chain.read_uint(&addresses.core, methods::GET_PENDING_POOL, &[]).await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod methods;
pub mod ports;
pub mod retry;
pub mod stub;

// Re-exports for convenience
pub use error::{ChainError, ChainResult};
pub use ports::{
    now_arg, ChainEvent, ChainPort, ChainValue, ContractAddresses, EventSubscription,
    SubscriptionHandle, TxReceipt, TxStatus,
};
pub use retry::{with_retry, write_with_retry, RetryPolicy};
pub use stub::{SimulatedChain, WriteRecord};
