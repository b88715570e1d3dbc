//! Chain facade port definitions.
//!
//! The port defines the read/write/subscribe surface the keepers need.
//! Adapters implement it for a concrete transport (JSON-RPC client,
//! `SimulatedChain`, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use stakeops_domain::{Address, Amount};

use crate::error::{ChainError, ChainResult};

// =============================================================================
// Contract Addresses
// =============================================================================

/// Addresses of the protocol contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// Staking core (pending pool, TVL, batch stake)
    pub core: Address,
    /// Validator registry (selection, liveness, stake)
    pub registry: Address,
    /// Withdrawal queue
    pub queue: Address,
    /// Liquidity vault (buffer, unstake)
    pub vault: Address,
}

impl ContractAddresses {
    /// Deterministic addresses for development and tests.
    pub fn fixture() -> Self {
        Self {
            core: Address::from_low_u64(0xc0de),
            registry: Address::from_low_u64(0x4e61),
            queue: Address::from_low_u64(0x9e7e),
            vault: Address::from_low_u64(0x7a17),
        }
    }
}

// =============================================================================
// Call Values
// =============================================================================

/// Argument or return value of a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ChainValue {
    /// Unsigned integer (amounts, ids, timestamps)
    Uint(Amount),
    /// Boolean
    Bool(bool),
    /// Address
    Address(Address),
    /// No value
    Unit,
}

impl ChainValue {
    /// Interpret as an unsigned integer.
    pub fn into_uint(self, method: &str) -> ChainResult<Amount> {
        match self {
            ChainValue::Uint(v) => Ok(v),
            other => Err(decode_error(method, "uint", &other)),
        }
    }

    /// Interpret as a boolean.
    pub fn into_bool(self, method: &str) -> ChainResult<bool> {
        match self {
            ChainValue::Bool(v) => Ok(v),
            other => Err(decode_error(method, "bool", &other)),
        }
    }

    /// Interpret as an address. `Unit` decodes to `None` (empty return).
    pub fn into_address(self, method: &str) -> ChainResult<Option<Address>> {
        match self {
            ChainValue::Address(a) if a.is_zero() => Ok(None),
            ChainValue::Address(a) => Ok(Some(a)),
            ChainValue::Unit => Ok(None),
            other => Err(decode_error(method, "address", &other)),
        }
    }

    /// Argument accessor used by adapters.
    pub fn as_uint(&self) -> Option<Amount> {
        match self {
            ChainValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Argument accessor used by adapters.
    pub fn as_address(&self) -> Option<&Address> {
        match self {
            ChainValue::Address(a) => Some(a),
            _ => None,
        }
    }
}

fn decode_error(method: &str, expected: &str, got: &ChainValue) -> ChainError {
    ChainError::Decode {
        method: method.to_string(),
        detail: format!("expected {}, got {:?}", expected, got),
    }
}

impl From<Amount> for ChainValue {
    fn from(v: Amount) -> Self {
        ChainValue::Uint(v)
    }
}

impl From<u64> for ChainValue {
    fn from(v: u64) -> Self {
        ChainValue::Uint(v as Amount)
    }
}

impl From<bool> for ChainValue {
    fn from(v: bool) -> Self {
        ChainValue::Bool(v)
    }
}

impl From<Address> for ChainValue {
    fn from(v: Address) -> Self {
        ChainValue::Address(v)
    }
}

/// Current time as a `uint` call argument (unix seconds).
pub fn now_arg(now: DateTime<Utc>) -> ChainValue {
    ChainValue::Uint(now.timestamp().max(0) as Amount)
}

// =============================================================================
// Receipts
// =============================================================================

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Executed successfully
    Success,
    /// Mined but reverted
    Reverted,
}

/// Receipt returned by a contract write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: String,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Execution status
    pub status: TxStatus,
}

impl TxReceipt {
    /// Turn a reverted receipt into an error.
    pub fn ensure_success(self) -> ChainResult<Self> {
        match self.status {
            TxStatus::Success => Ok(self),
            TxStatus::Reverted => Err(ChainError::Reverted(format!(
                "tx {} reverted in block {}",
                self.tx_hash, self.block_number
            ))),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Contract event delivered to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Emitting contract
    pub address: Address,
    /// Event name
    pub name: String,
    /// Block the event was emitted in
    pub block_number: u64,
    /// Decoded event arguments
    pub args: Vec<ChainValue>,
}

/// Live event subscription.
///
/// Yields events until unsubscribed or until the adapter drops its sender.
pub struct EventSubscription {
    receiver: mpsc::Receiver<ChainEvent>,
    cancel: CancellationToken,
}

impl EventSubscription {
    /// Wrap an adapter channel. Adapters should stop sending once `cancel` fires.
    pub fn new(receiver: mpsc::Receiver<ChainEvent>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Receive the next event.
    ///
    /// Returns `None` once unsubscribed or the adapter side is gone.
    pub async fn recv(&mut self) -> Option<ChainEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.receiver.recv() => event,
        }
    }

    /// Handle that can unsubscribe from another task.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Stop receiving events. Idempotent.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

/// Cloneable unsubscribe handle.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// Stop the subscription. Idempotent.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    /// Whether the subscription has been stopped
    pub fn is_unsubscribed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// =============================================================================
// Chain Port
// =============================================================================

/// Port for contract reads, writes, and event subscriptions.
///
/// Implementations:
/// - `SimulatedChain` - In-memory protocol for development and tests
/// - A JSON-RPC adapter supplied by the deployment
#[async_trait]
pub trait ChainPort: Send + Sync {
    /// Connect to the RPC endpoint.
    async fn connect(&self, rpc_url: &str) -> ChainResult<()>;

    /// Whether the connection is currently up.
    fn is_connected(&self) -> bool;

    /// Call a view method.
    async fn read_contract(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<ChainValue>;

    /// Submit a transaction and wait for its receipt.
    async fn write_contract(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<TxReceipt>;

    /// Subscribe to an event emitted by `address`.
    async fn watch_events(&self, address: &Address, event_name: &str)
        -> ChainResult<EventSubscription>;

    /// Call a view method returning an unsigned integer.
    async fn read_uint(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<Amount> {
        self.read_contract(address, method, args).await?.into_uint(method)
    }

    /// Call a view method returning a boolean.
    async fn read_bool(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<bool> {
        self.read_contract(address, method, args).await?.into_bool(method)
    }

    /// Call a view method returning an address; empty or zero maps to `None`.
    async fn read_address(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<Option<Address>> {
        self.read_contract(address, method, args).await?.into_address(method)
    }
}

// =============================================================================
// Tests
// =============================================================================
