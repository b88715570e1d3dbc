//! Stakeops Domain Layer
//!
//! Pure data model for the liquid-staking keepers, with zero I/O dependencies.
//! Contains value objects, polled state snapshots, and alert records.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod alert;
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use alert::{dedup_key, Alert, AlertDetails, Severity};
pub use entities::{ClaimableRequest, QueueStatus, RequestId, TvlData, ValidatorStatus};
pub use value_objects::{format_amount, to_units, Address, Amount, DomainError, WEI_PER_UNIT};
