//! Contract method and event names invoked by the keepers.

/// Core: deposits awaiting allocation
pub const GET_PENDING_POOL: &str = "get_pending_pool";
/// Core: total value locked
pub const GET_TVL: &str = "get_tvl";
/// Core: stAsset to asset ratio in basis points
pub const GET_EXCHANGE_RATE: &str = "get_exchange_rate";
/// Core: stake the pending pool to a validator
pub const EXECUTE_BATCH_STAKE: &str = "execute_batch_stake";

/// Registry: round-robin validator selection
pub const SELECT_NEXT_VALIDATOR: &str = "select_next_validator";
/// Registry: validator liveness
pub const IS_ACTIVE: &str = "is_active";
/// Registry: stake delegated to a validator
pub const GET_VALIDATOR_STAKE: &str = "get_validator_stake";

/// Queue: number of withdrawal requests
pub const GET_QUEUE_LENGTH: &str = "get_queue_length";
/// Queue: whether a request's unbonding period has elapsed
pub const IS_CLAIMABLE: &str = "is_claimable";
/// Queue: amount owed by a request
pub const GET_REQUEST_AMOUNT: &str = "get_request_amount";
/// Queue: pay out a request
pub const CLAIM_WITHDRAWAL: &str = "claim_withdrawal";

/// Vault: liquidity buffer balance
pub const GET_LIQUIDITY_BUFFER: &str = "get_liquidity_buffer";
/// Vault: move stake back into the buffer
pub const REQUEST_UNSTAKE: &str = "request_unstake";

/// Core event emitted on every deposit
pub const DEPOSIT_EVENT: &str = "Deposit";
