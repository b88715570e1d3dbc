//! Alert records raised by the keepers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Free-form structured context attached to an alert.
pub type AlertDetails = BTreeMap<String, serde_json::Value>;

// =============================================================================
// Severity
// =============================================================================

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Needs a human now (paged)
    Critical,
    /// Degraded but self-healing is possible
    Warning,
    /// Informational
    Info,
}

impl Severity {
    /// Lowercase label used in dedup keys, metrics, and payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Alert
// =============================================================================

/// An immutable alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier (time-ordered)
    pub id: Uuid,
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Structured context
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: AlertDetails,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert raised at `timestamp`.
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        details: AlertDetails,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            severity,
            message: message.into(),
            details,
            timestamp,
        }
    }

    /// Deduplication key: `severity:message`.
    ///
    /// Keyed on the literal message, so messages that interpolate dynamic
    /// values produce distinct keys.
    pub fn dedup_key(&self) -> String {
        dedup_key(self.severity, &self.message)
    }
}

/// Deduplication key for a `(severity, message)` pair.
pub fn dedup_key(severity: Severity, message: &str) -> String {
    format!("{}:{}", severity.as_str(), message)
}

// =============================================================================
// Tests
// =============================================================================
