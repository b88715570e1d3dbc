//! Stakeops Alerts
//!
//! Deduplicated, multi-channel alert delivery shared by every keeper process.
//!
//! # Architecture
//!
//! ```text
//! Keeper → AlertDispatcher → AlertChannel (Telegram | Slack | PagerDuty) → WebhookTransport
//! ```
//!
//! # Components
//!
//! - **Dispatcher**: cooldown table, ring buffer, concurrent fan-out
//! - **Channels**: payload contracts for each destination
//! - **Transport**: `reqwest` transport and an in-memory recorder

#![warn(clippy::all)]

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod transport;

// Re-exports for convenience
pub use channels::{AlertChannel, PagerDutyChannel, SlackChannel, TelegramChannel};
pub use dispatcher::{default_cooldown, AlertDispatcher, DispatchOutcome, DEFAULT_HISTORY};
pub use error::{AlertError, AlertResult};
pub use transport::{HttpTransport, MemoryTransport, SentPayload, WebhookTransport};
