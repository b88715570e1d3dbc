//! Value Objects for the Stakeops Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Address must be `0x` followed by 40 hex characters
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Amount cannot be represented as a decimal
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),

    /// Derived TVL components do not add up
    #[error("Inconsistent TVL: {0}")]
    InconsistentTvl(String),
}

// =============================================================================
// Amount
// =============================================================================

/// On-chain token amount in the smallest unit (wei-like).
pub type Amount = u128;

/// Smallest units per whole token (18 decimals).
pub const WEI_PER_UNIT: Amount = 1_000_000_000_000_000_000;

/// Number of decimals carried by [`Amount`].
const AMOUNT_DECIMALS: u32 = 18;

/// Convert a wei amount into whole-token units.
///
/// # Errors
/// Returns `DomainError::AmountOutOfRange` if the amount exceeds the
/// 96-bit mantissa supported by `Decimal`.
pub fn to_units(amount: Amount) -> Result<Decimal, DomainError> {
    let signed = i128::try_from(amount)
        .map_err(|_| DomainError::AmountOutOfRange(amount.to_string()))?;
    Decimal::try_from_i128_with_scale(signed, AMOUNT_DECIMALS)
        .map_err(|_| DomainError::AmountOutOfRange(amount.to_string()))
}

/// Human-readable rendering of a wei amount (whole units, 4 decimals).
///
/// Falls back to the raw wei value with a `wei` suffix when the amount is
/// too large to convert.
pub fn format_amount(amount: Amount) -> String {
    match to_units(amount) {
        Ok(units) => units.round_dp(4).normalize().to_string(),
        Err(_) => format!("{} wei", amount),
    }
}

// =============================================================================
// Address
// =============================================================================

/// Address represents a 20-byte contract or validator address
///
/// # Invariants
/// - `0x` prefix followed by exactly 40 hex characters
/// - Stored lowercase so equality is case-insensitive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse an address from its hex representation
    ///
    /// # Examples
    /// ```
    /// # use stakeops_domain::value_objects::Address;
    /// let addr = Address::parse("0x00000000000000000000000000000000000000Ab").unwrap();
    /// assert_eq!(addr.as_str(), "0x00000000000000000000000000000000000000ab");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidAddress` if format is invalid
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| DomainError::InvalidAddress(format!("missing 0x prefix: {}", value)))?;

        if hex.len() != 40 {
            return Err(DomainError::InvalidAddress(format!(
                "expected 40 hex characters, got {}: {}",
                hex.len(),
                value
            )));
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidAddress(format!("non-hex character in {}", value)));
        }

        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Build a deterministic address whose low bytes encode `n`.
    ///
    /// Used for placeholder and fixture addresses.
    pub fn from_low_u64(n: u64) -> Self {
        Self(format!("0x{:040x}", n))
    }

    /// The zero address
    pub fn zero() -> Self {
        Self::from_low_u64(0)
    }

    /// Whether this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    /// Get the lowercase hex string (with `0x` prefix)
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
