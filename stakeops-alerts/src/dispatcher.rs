//! Alert Dispatcher
//!
//! Severity-tagged, deduplicated, multi-channel notification sink.
//!
//! ```text
//!   send_alert(severity, message, details)
//!     -> cooldown table  (drop if same severity:message within 5 minutes)
//!     -> ring buffer     (last 100 alerts)
//!     -> fan-out         (every accepting channel, concurrently)
//! ```
//!
//! Channel failures are logged one by one and never returned to the caller.

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use stakeops_domain::{Alert, AlertDetails, Severity};

use crate::channels::AlertChannel;

/// Alerts retained in the ring buffer
pub const DEFAULT_HISTORY: usize = 100;

/// Minimum time between two deliveries of the same key
pub fn default_cooldown() -> Duration {
    Duration::minutes(5)
}

/// Result of a `send_alert` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Same key delivered within the cooldown window; nothing recorded
    Suppressed,
    /// Recorded and fanned out
    Dispatched {
        /// Channels that accepted the severity
        attempted: usize,
        /// Channels whose delivery failed
        failed: usize,
    },
}

impl DispatchOutcome {
    /// Whether the alert was recorded and fanned out.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchOutcome::Dispatched { .. })
    }
}

#[derive(Default)]
struct DispatcherState {
    /// Last-sent timestamp per dedup key
    cooldowns: HashMap<String, DateTime<Utc>>,
    /// Most recent alerts, oldest first
    recent: VecDeque<Alert>,
}

// =============================================================================
// Alert Dispatcher
// =============================================================================

/// Deduplicating fan-out to every configured channel.
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
    cooldown: Duration,
    history: usize,
    state: Mutex<DispatcherState>,
}

impl AlertDispatcher {
    /// Create a dispatcher with the default cooldown and history size.
    pub fn new(channels: Vec<Arc<dyn AlertChannel>>) -> Self {
        Self {
            channels,
            cooldown: default_cooldown(),
            history: DEFAULT_HISTORY,
            state: Mutex::new(DispatcherState::default()),
        }
    }

    /// Override the ring buffer size.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Names of the configured channels.
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn state(&self) -> MutexGuard<'_, DispatcherState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Raise an alert now.
    pub async fn send_alert(
        &self,
        severity: Severity,
        message: impl Into<String>,
        details: AlertDetails,
    ) -> DispatchOutcome {
        self.send_alert_at(severity, message, details, Utc::now()).await
    }

    /// Raise an alert as of `now`.
    pub async fn send_alert_at(
        &self,
        severity: Severity,
        message: impl Into<String>,
        details: AlertDetails,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let alert = Alert::new(severity, message, details, now);
        let key = alert.dedup_key();

        {
            let mut state = self.state();

            if let Some(last_sent) = state.cooldowns.get(&key) {
                if now - *last_sent < self.cooldown {
                    debug!(key = %key, "Alert suppressed by cooldown");
                    return DispatchOutcome::Suppressed;
                }
            }

            let cooldown = self.cooldown;
            state.cooldowns.retain(|_, last_sent| now - *last_sent < cooldown);
            state.cooldowns.insert(key, now);
            state.recent.push_back(alert.clone());
            while state.recent.len() > self.history {
                state.recent.pop_front();
            }
        }

        info!(severity = %alert.severity, message = %alert.message, "Alert raised");

        let targets: Vec<&Arc<dyn AlertChannel>> = self
            .channels
            .iter()
            .filter(|c| c.accepts(alert.severity))
            .collect();

        let results = join_all(targets.iter().map(|channel| {
            let alert = &alert;
            async move { (channel.name(), channel.deliver(alert).await) }
        }))
        .await;

        let mut failed = 0;
        for (name, result) in results {
            if let Err(e) = result {
                failed += 1;
                warn!(channel = name, error = %e, "Alert delivery failed");
            }
        }

        DispatchOutcome::Dispatched {
            attempted: targets.len(),
            failed,
        }
    }

    /// Recorded alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.state().recent.iter().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
