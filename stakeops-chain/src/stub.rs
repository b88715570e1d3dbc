//! Simulated chain for development and tests.
//!
//! `SimulatedChain` keeps the protocol's contract state in memory and
//! answers the same reads, writes, and subscriptions a live deployment
//! would. It never emits events on its own; deposits are injected with
//! [`SimulatedChain::deposit`].

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use stakeops_domain::{Address, Amount, RequestId};

use crate::error::{ChainError, ChainResult};
use crate::methods;
use crate::ports::{
    ChainEvent, ChainPort, ChainValue, ContractAddresses, EventSubscription, TxReceipt, TxStatus,
};

/// Exchange rate at parity (10000 bps = 1.0).
const PARITY_BPS: Amount = 10_000;

/// Buffered events per subscriber.
const SUBSCRIBER_CAPACITY: usize = 64;

// =============================================================================
// State
// =============================================================================

/// A write that reached the simulated chain (successful or not).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Target contract
    pub address: Address,
    /// Method name
    pub method: String,
    /// Call arguments
    pub args: Vec<ChainValue>,
    /// Whether the write was applied
    pub applied: bool,
}

#[derive(Debug, Clone)]
struct SimValidator {
    address: Address,
    active: bool,
    stake: Amount,
}

#[derive(Debug, Clone)]
struct SimRequest {
    amount: Amount,
    claimable_at: u64,
    claimed: bool,
}

#[derive(Debug, Clone)]
struct PendingUnstake {
    amount: Amount,
    settles_at: DateTime<Utc>,
}

struct Subscriber {
    address: Address,
    event_name: String,
    sender: mpsc::Sender<ChainEvent>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct ChainState {
    pending_pool: Amount,
    total: Amount,
    liquidity_buffer: Amount,
    exchange_rate_bps: Amount,
    validators: Vec<SimValidator>,
    next_validator: usize,
    requests: Vec<SimRequest>,
    pending_unstakes: Vec<PendingUnstake>,
    block_number: u64,
    tx_counter: u64,
    method_faults: HashMap<String, u32>,
    failing_requests: HashSet<RequestId>,
    failing_claims: HashSet<RequestId>,
    writes: Vec<WriteRecord>,
    subscribers: Vec<Subscriber>,
}

impl ChainState {
    fn staked(&self) -> Amount {
        self.total
            .saturating_sub(self.pending_pool)
            .saturating_sub(self.liquidity_buffer)
    }

    fn settle_unstakes(&mut self, now: DateTime<Utc>) {
        let (settled, pending): (Vec<_>, Vec<_>) = self
            .pending_unstakes
            .drain(..)
            .partition(|u| u.settles_at <= now);
        self.pending_unstakes = pending;

        for unstake in settled {
            self.liquidity_buffer = self.liquidity_buffer.saturating_add(unstake.amount);
        }
    }

    fn take_fault(&mut self, method: &str) -> bool {
        match self.method_faults.get_mut(method) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn active_validators(&self) -> Vec<&SimValidator> {
        self.validators.iter().filter(|v| v.active).collect()
    }

    fn next_receipt(&mut self) -> TxReceipt {
        self.tx_counter += 1;
        self.block_number += 1;
        TxReceipt {
            tx_hash: format!("0x{:064x}", self.tx_counter),
            block_number: self.block_number,
            status: TxStatus::Success,
        }
    }
}

// =============================================================================
// Simulated Chain
// =============================================================================

/// In-memory protocol simulation.
pub struct SimulatedChain {
    addresses: ContractAddresses,
    connected: AtomicBool,
    refuse_connections: AtomicBool,
    unstake_delay: ChronoDuration,
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    /// Create a simulated chain with empty protocol state.
    pub fn new(addresses: ContractAddresses) -> Self {
        Self {
            addresses,
            connected: AtomicBool::new(false),
            refuse_connections: AtomicBool::new(false),
            unstake_delay: ChronoDuration::zero(),
            state: Mutex::new(ChainState {
                exchange_rate_bps: PARITY_BPS,
                ..ChainState::default()
            }),
        }
    }

    /// Delay before requested unstakes land in the buffer.
    pub fn with_unstake_delay(mut self, delay: ChronoDuration) -> Self {
        self.unstake_delay = delay;
        self
    }

    /// Contract addresses this chain answers for.
    pub fn addresses(&self) -> &ContractAddresses {
        &self.addresses
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -------------------------------------------------------------------------
    // Scenario setup
    // -------------------------------------------------------------------------

    /// Make subsequent `connect` calls fail.
    pub fn refuse_connections(&self) {
        self.refuse_connections.store(true, Ordering::SeqCst);
    }

    /// Drop the connection (as if the transport went away).
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Record a deposit and notify `Deposit` subscribers.
    pub fn deposit(&self, amount: Amount) {
        let mut state = self.state();
        state.pending_pool = state.pending_pool.saturating_add(amount);
        state.total = state.total.saturating_add(amount);
        state.block_number += 1;

        let event = ChainEvent {
            address: self.addresses.core.clone(),
            name: methods::DEPOSIT_EVENT.to_string(),
            block_number: state.block_number,
            args: vec![ChainValue::Uint(amount)],
        };

        state
            .subscribers
            .retain(|s| !s.cancel.is_cancelled() && !s.sender.is_closed());

        for sub in &state.subscribers {
            if sub.address == event.address
                && sub.event_name == event.name
                && sub.sender.try_send(event.clone()).is_err()
            {
                debug!(event = %event.name, "Subscriber full, dropping event");
            }
        }
    }

    /// Overwrite the pending pool (TVL follows the difference).
    pub fn set_pending_pool(&self, amount: Amount) {
        let mut state = self.state();
        let staked = state.staked();
        state.pending_pool = amount;
        state.total = staked
            .saturating_add(state.pending_pool)
            .saturating_add(state.liquidity_buffer);
    }

    /// Overwrite the liquidity buffer (TVL follows the difference).
    pub fn set_liquidity_buffer(&self, amount: Amount) {
        let mut state = self.state();
        let staked = state.staked();
        state.liquidity_buffer = amount;
        state.total = staked
            .saturating_add(state.pending_pool)
            .saturating_add(state.liquidity_buffer);
    }

    /// Overwrite total TVL without touching pool or buffer.
    pub fn set_tvl(&self, total: Amount) {
        self.state().total = total;
    }

    /// Overwrite the exchange rate.
    pub fn set_exchange_rate(&self, bps: Amount) {
        self.state().exchange_rate_bps = bps;
    }

    /// Register a validator.
    pub fn add_validator(&self, address: Address, active: bool, stake: Amount) {
        let mut state = self.state();
        state.total = state.total.saturating_add(stake);
        state.validators.push(SimValidator { address, active, stake });
    }

    /// Flip a validator's liveness.
    pub fn set_validator_active(&self, address: &Address, active: bool) {
        let mut state = self.state();
        if let Some(v) = state.validators.iter_mut().find(|v| &v.address == address) {
            v.active = active;
        }
    }

    /// Enqueue a withdrawal request claimable from `claimable_at` (unix seconds).
    pub fn add_withdrawal_request(&self, amount: Amount, claimable_at: u64) -> RequestId {
        let mut state = self.state();
        state.requests.push(SimRequest {
            amount,
            claimable_at,
            claimed: false,
        });
        (state.requests.len() - 1) as RequestId
    }

    /// Enqueue a withdrawal request that is already claimable.
    pub fn add_claimable_request(&self, amount: Amount) -> RequestId {
        self.add_withdrawal_request(amount, 0)
    }

    /// Enqueue a withdrawal request that is still unbonding.
    pub fn add_unbonding_request(&self, amount: Amount) -> RequestId {
        self.add_withdrawal_request(amount, u64::MAX)
    }

    /// Fail the next `times` calls (read or write) of `method`.
    pub fn fail_next(&self, method: &str, times: u32) {
        self.state().method_faults.insert(method.to_string(), times);
    }

    /// Make every read about request `id` fail.
    pub fn fail_request_reads(&self, id: RequestId) {
        self.state().failing_requests.insert(id);
    }

    /// Make every claim of request `id` revert.
    pub fn fail_claims(&self, id: RequestId) {
        self.state().failing_claims.insert(id);
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// All writes received so far.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state().writes.clone()
    }

    /// Writes of `method` that were applied.
    pub fn applied_writes(&self, method: &str) -> Vec<WriteRecord> {
        self.state()
            .writes
            .iter()
            .filter(|w| w.method == method && w.applied)
            .cloned()
            .collect()
    }

    /// Current pending pool.
    pub fn pending_pool(&self) -> Amount {
        self.state().pending_pool
    }

    /// Current liquidity buffer (after settling due unstakes).
    pub fn liquidity_buffer(&self) -> Amount {
        let mut state = self.state();
        state.settle_unstakes(Utc::now());
        state.liquidity_buffer
    }

    /// Stake currently held by `address`.
    pub fn validator_stake(&self, address: &Address) -> Option<Amount> {
        self.state()
            .validators
            .iter()
            .find(|v| &v.address == address)
            .map(|v| v.stake)
    }

    /// Whether request `id` has been paid out.
    pub fn is_claimed(&self, id: RequestId) -> bool {
        self.state()
            .requests
            .get(id as usize)
            .map(|r| r.claimed)
            .unwrap_or(false)
    }

    /// Number of live `Deposit` subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state();
        state
            .subscribers
            .retain(|s| !s.cancel.is_cancelled() && !s.sender.is_closed());
        state.subscribers.len()
    }

    // -------------------------------------------------------------------------
    // Call handling
    // -------------------------------------------------------------------------

    fn ensure_connected(&self) -> ChainResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ChainError::NotConnected)
        }
    }

    fn ensure_target(&self, address: &Address, expected: &Address, method: &str) -> ChainResult<()> {
        if address == expected {
            Ok(())
        } else {
            Err(ChainError::Reverted(format!(
                "{} is not implemented by {}",
                method, address
            )))
        }
    }

    fn request_index(state: &ChainState, args: &[ChainValue], method: &str) -> ChainResult<usize> {
        let id = uint_arg(args, 0, method)?;
        let index = usize::try_from(id)
            .map_err(|_| ChainError::InvalidArgument(format!("{}: request id {}", method, id)))?;

        if state.failing_requests.contains(&(id as RequestId)) {
            return Err(ChainError::Rpc(format!("{}: request {} unavailable", method, id)));
        }

        if index >= state.requests.len() {
            return Err(ChainError::Reverted(format!("{}: no request {}", method, id)));
        }
        Ok(index)
    }

    fn read(&self, address: &Address, method: &str, args: &[ChainValue]) -> ChainResult<ChainValue> {
        let a = &self.addresses;
        let mut state = self.state();
        state.settle_unstakes(Utc::now());

        if state.take_fault(method) {
            return Err(ChainError::Rpc(format!("simulated failure of {}", method)));
        }

        match method {
            methods::GET_PENDING_POOL => {
                self.ensure_target(address, &a.core, method)?;
                Ok(ChainValue::Uint(state.pending_pool))
            }
            methods::GET_TVL => {
                self.ensure_target(address, &a.core, method)?;
                Ok(ChainValue::Uint(state.total))
            }
            methods::GET_EXCHANGE_RATE => {
                self.ensure_target(address, &a.core, method)?;
                Ok(ChainValue::Uint(state.exchange_rate_bps))
            }
            methods::GET_LIQUIDITY_BUFFER => {
                self.ensure_target(address, &a.vault, method)?;
                Ok(ChainValue::Uint(state.liquidity_buffer))
            }
            methods::SELECT_NEXT_VALIDATOR => {
                self.ensure_target(address, &a.registry, method)?;
                let active = state.active_validators();
                if active.is_empty() {
                    return Ok(ChainValue::Unit);
                }
                let chosen = active[state.next_validator % active.len()];
                Ok(ChainValue::Address(chosen.address.clone()))
            }
            methods::IS_ACTIVE | methods::GET_VALIDATOR_STAKE => {
                self.ensure_target(address, &a.registry, method)?;
                let validator_addr = args
                    .first()
                    .and_then(ChainValue::as_address)
                    .ok_or_else(|| ChainError::InvalidArgument(format!("{}: missing address", method)))?;
                let validator = state
                    .validators
                    .iter()
                    .find(|v| &v.address == validator_addr)
                    .ok_or_else(|| {
                        ChainError::Reverted(format!("{}: unknown validator {}", method, validator_addr))
                    })?;

                if method == methods::IS_ACTIVE {
                    Ok(ChainValue::Bool(validator.active))
                } else {
                    Ok(ChainValue::Uint(validator.stake))
                }
            }
            methods::GET_QUEUE_LENGTH => {
                self.ensure_target(address, &a.queue, method)?;
                Ok(ChainValue::Uint(state.requests.len() as Amount))
            }
            methods::IS_CLAIMABLE => {
                self.ensure_target(address, &a.queue, method)?;
                let index = Self::request_index(&state, args, method)?;
                let now = uint_arg(args, 1, method)?;
                let request = &state.requests[index];
                Ok(ChainValue::Bool(
                    !request.claimed && now >= request.claimable_at as Amount,
                ))
            }
            methods::GET_REQUEST_AMOUNT => {
                self.ensure_target(address, &a.queue, method)?;
                let index = Self::request_index(&state, args, method)?;
                let request = &state.requests[index];
                Ok(ChainValue::Uint(if request.claimed { 0 } else { request.amount }))
            }
            other => Err(ChainError::UnknownMethod(other.to_string())),
        }
    }

    fn write(&self, address: &Address, method: &str, args: &[ChainValue]) -> ChainResult<TxReceipt> {
        let mut state = self.state();
        state.settle_unstakes(Utc::now());

        let result = if state.take_fault(method) {
            Err(ChainError::Timeout(format!("simulated timeout of {}", method)))
        } else {
            self.apply_write(&mut state, address, method, args)
        };

        state.writes.push(WriteRecord {
            address: address.clone(),
            method: method.to_string(),
            args: args.to_vec(),
            applied: result.is_ok(),
        });

        result
    }

    fn apply_write(
        &self,
        state: &mut ChainState,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<TxReceipt> {
        let a = &self.addresses;

        match method {
            methods::EXECUTE_BATCH_STAKE => {
                self.ensure_target(address, &a.core, method)?;
                let validator_addr = args
                    .first()
                    .and_then(ChainValue::as_address)
                    .ok_or_else(|| ChainError::InvalidArgument(format!("{}: missing validator", method)))?
                    .clone();

                if state.pending_pool == 0 {
                    return Err(ChainError::Reverted("execute_batch_stake: empty pending pool".to_string()));
                }

                let amount = state.pending_pool;
                state.pending_pool = 0;
                if let Some(v) = state.validators.iter_mut().find(|v| v.address == validator_addr) {
                    v.stake = v.stake.saturating_add(amount);
                }
                state.next_validator = state.next_validator.wrapping_add(1);
                Ok(state.next_receipt())
            }
            methods::REQUEST_UNSTAKE => {
                self.ensure_target(address, &a.vault, method)?;
                let amount = uint_arg(args, 0, method)?;
                if amount == 0 {
                    return Err(ChainError::Reverted("request_unstake: zero amount".to_string()));
                }

                let in_flight: Amount = state.pending_unstakes.iter().map(|u| u.amount).sum();
                if state.staked().saturating_sub(in_flight) < amount {
                    return Err(ChainError::Reverted(format!(
                        "request_unstake: {} exceeds staked balance",
                        amount
                    )));
                }

                state.pending_unstakes.push(PendingUnstake {
                    amount,
                    settles_at: Utc::now() + self.unstake_delay,
                });
                Ok(state.next_receipt())
            }
            methods::CLAIM_WITHDRAWAL => {
                self.ensure_target(address, &a.queue, method)?;
                let id = uint_arg(args, 0, method)?;
                let now = uint_arg(args, 1, method)?;

                if state.failing_claims.contains(&(id as RequestId)) {
                    return Err(ChainError::Reverted(format!("claim_withdrawal: request {} rejected", id)));
                }

                let index = usize::try_from(id)
                    .ok()
                    .filter(|i| *i < state.requests.len())
                    .ok_or_else(|| ChainError::Reverted(format!("claim_withdrawal: no request {}", id)))?;

                let request = state.requests[index].clone();
                if request.claimed {
                    return Err(ChainError::Reverted(format!("claim_withdrawal: request {} already claimed", id)));
                }
                if now < request.claimable_at as Amount {
                    return Err(ChainError::Reverted(format!("claim_withdrawal: request {} still unbonding", id)));
                }
                if state.liquidity_buffer < request.amount {
                    return Err(ChainError::Reverted(format!(
                        "claim_withdrawal: insufficient liquidity for request {}",
                        id
                    )));
                }

                state.liquidity_buffer -= request.amount;
                state.total = state.total.saturating_sub(request.amount);
                state.requests[index].claimed = true;
                Ok(state.next_receipt())
            }
            other => Err(ChainError::UnknownMethod(other.to_string())),
        }
    }
}

fn uint_arg(args: &[ChainValue], index: usize, method: &str) -> ChainResult<Amount> {
    args.get(index)
        .and_then(ChainValue::as_uint)
        .ok_or_else(|| ChainError::InvalidArgument(format!("{}: missing uint argument {}", method, index)))
}

#[async_trait]
impl ChainPort for SimulatedChain {
    async fn connect(&self, rpc_url: &str) -> ChainResult<()> {
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(ChainError::Connection(format!("{} refused connection", rpc_url)));
        }

        self.connected.store(true, Ordering::SeqCst);
        debug!(rpc_url, "Simulated chain connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_contract(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<ChainValue> {
        self.ensure_connected()?;
        self.read(address, method, args)
    }

    async fn write_contract(
        &self,
        address: &Address,
        method: &str,
        args: &[ChainValue],
    ) -> ChainResult<TxReceipt> {
        self.ensure_connected()?;
        self.write(address, method, args)
    }

    async fn watch_events(
        &self,
        address: &Address,
        event_name: &str,
    ) -> ChainResult<EventSubscription> {
        self.ensure_connected()?;

        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let cancel = CancellationToken::new();

        self.state().subscribers.push(Subscriber {
            address: address.clone(),
            event_name: event_name.to_string(),
            sender,
            cancel: cancel.clone(),
        });

        Ok(EventSubscription::new(receiver, cancel))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::now_arg;

    async fn connected_chain() -> SimulatedChain {
        let chain = SimulatedChain::new(ContractAddresses::fixture());
        chain.connect("sim://local").await.unwrap();
        chain
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let chain = SimulatedChain::new(ContractAddresses::fixture());
        let core = chain.addresses().core.clone();

        let err = chain
            .read_contract(&core, methods::GET_PENDING_POOL, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::NotConnected));
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let chain = SimulatedChain::new(ContractAddresses::fixture());
        chain.refuse_connections();

        assert!(chain.connect("sim://local").await.is_err());
        assert!(!chain.is_connected());
    }

    #[tokio::test]
    async fn test_deposit_updates_pool_and_notifies() {
        let chain = connected_chain().await;
        let core = chain.addresses().core.clone();
        let mut sub = chain.watch_events(&core, methods::DEPOSIT_EVENT).await.unwrap();

        chain.deposit(500);

        let event = sub.recv().await.unwrap();
        assert_eq!(event.name, methods::DEPOSIT_EVENT);
        assert_eq!(event.args, vec![ChainValue::Uint(500)]);
        assert_eq!(chain.read_uint(&core, methods::GET_PENDING_POOL, &[]).await.unwrap(), 500);
        assert_eq!(chain.read_uint(&core, methods::GET_TVL, &[]).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_unsubscribed_stops_delivery() {
        let chain = connected_chain().await;
        let core = chain.addresses().core.clone();
        let sub = chain.watch_events(&core, methods::DEPOSIT_EVENT).await.unwrap();
        assert_eq!(chain.subscriber_count(), 1);

        sub.unsubscribe();
        chain.deposit(1);
        assert_eq!(chain.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_contract_reverts() {
        let chain = connected_chain().await;
        let vault = chain.addresses().vault.clone();

        let err = chain
            .read_contract(&vault, methods::GET_PENDING_POOL, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));
    }

    #[tokio::test]
    async fn test_round_robin_selection_skips_inactive() {
        let chain = connected_chain().await;
        let a = chain.addresses().clone();
        let v1 = Address::from_low_u64(1);
        let v2 = Address::from_low_u64(2);
        let v3 = Address::from_low_u64(3);
        chain.add_validator(v1.clone(), true, 0);
        chain.add_validator(v2, false, 0);
        chain.add_validator(v3.clone(), true, 0);

        let first = chain.read_address(&a.registry, methods::SELECT_NEXT_VALIDATOR, &[]).await.unwrap();
        assert_eq!(first, Some(v1.clone()));

        chain.deposit(10);
        chain
            .write_contract(&a.core, methods::EXECUTE_BATCH_STAKE, &[ChainValue::from(v1.clone())])
            .await
            .unwrap();

        let second = chain.read_address(&a.registry, methods::SELECT_NEXT_VALIDATOR, &[]).await.unwrap();
        assert_eq!(second, Some(v3));
        assert_eq!(chain.validator_stake(&v1), Some(10));
        assert_eq!(chain.pending_pool(), 0);
    }

    #[tokio::test]
    async fn test_no_active_validator_returns_empty() {
        let chain = connected_chain().await;
        let registry = chain.addresses().registry.clone();

        let chosen = chain.read_address(&registry, methods::SELECT_NEXT_VALIDATOR, &[]).await.unwrap();
        assert_eq!(chosen, None);
    }

    #[tokio::test]
    async fn test_claim_requires_liquidity() {
        let chain = connected_chain().await;
        let queue = chain.addresses().queue.clone();
        let id = chain.add_claimable_request(100);
        chain.set_liquidity_buffer(40);

        let args = [ChainValue::from(id), now_arg(Utc::now())];
        let err = chain.write_contract(&queue, methods::CLAIM_WITHDRAWAL, &args).await.unwrap_err();
        assert!(matches!(err, ChainError::Reverted(_)));

        chain.set_liquidity_buffer(100);
        chain.write_contract(&queue, methods::CLAIM_WITHDRAWAL, &args).await.unwrap();
        assert!(chain.is_claimed(id));
        assert_eq!(chain.liquidity_buffer(), 0);
    }

    #[tokio::test]
    async fn test_unstake_settles_into_buffer() {
        let chain = connected_chain().await;
        let vault = chain.addresses().vault.clone();
        chain.add_validator(Address::from_low_u64(1), true, 1_000);

        chain
            .write_contract(&vault, methods::REQUEST_UNSTAKE, &[ChainValue::Uint(300)])
            .await
            .unwrap();

        assert_eq!(chain.liquidity_buffer(), 300);
        assert_eq!(chain.applied_writes(methods::REQUEST_UNSTAKE).len(), 1);
    }

    #[tokio::test]
    async fn test_delayed_unstake_stays_pending() {
        let chain = SimulatedChain::new(ContractAddresses::fixture())
            .with_unstake_delay(ChronoDuration::hours(1));
        chain.connect("sim://local").await.unwrap();
        chain.add_validator(Address::from_low_u64(1), true, 1_000);
        let vault = chain.addresses().vault.clone();

        chain
            .write_contract(&vault, methods::REQUEST_UNSTAKE, &[ChainValue::Uint(300)])
            .await
            .unwrap();

        assert_eq!(chain.liquidity_buffer(), 0);
    }

    #[tokio::test]
    async fn test_fault_injection_counts_down() {
        let chain = connected_chain().await;
        let core = chain.addresses().core.clone();
        chain.fail_next(methods::GET_TVL, 1);

        assert!(chain.read_uint(&core, methods::GET_TVL, &[]).await.is_err());
        assert!(chain.read_uint(&core, methods::GET_TVL, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_write_is_recorded() {
        let chain = connected_chain().await;
        let core = chain.addresses().core.clone();

        let result = chain
            .write_contract(&core, methods::EXECUTE_BATCH_STAKE, &[ChainValue::from(Address::from_low_u64(1))])
            .await;

        assert!(result.is_err());
        let writes = chain.writes();
        assert_eq!(writes.len(), 1);
        assert!(!writes[0].applied);
    }
}
