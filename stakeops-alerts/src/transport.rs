//! Webhook transports used by the alert channels.
//!
//! Channels build a JSON payload and hand it to a [`WebhookTransport`].
//! [`HttpTransport`] posts it with `reqwest`; [`MemoryTransport`] records
//! it in memory for development and tests.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{AlertError, AlertResult};

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum response body kept in error messages
const MAX_ERROR_BODY: usize = 256;

// =============================================================================
// Transport Port
// =============================================================================

/// Port for posting a JSON payload to a webhook URL.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `body` as JSON to `url`.
    async fn post_json(&self, url: &str, body: &Value) -> AlertResult<()>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// `reqwest`-backed transport.
pub struct HttpTransport {
    client: Client,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default request timeout.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post_json(&self, url: &str, body: &Value) -> AlertResult<()> {
        let response = timeout(self.request_timeout, self.client.post(url).json(body).send())
            .await
            .map_err(|_| AlertError::Timeout)?
            .map_err(|e| AlertError::RequestFailed(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(AlertError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

// =============================================================================
// Memory Transport
// =============================================================================

/// A payload captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentPayload {
    /// Destination URL
    pub url: String,
    /// JSON body
    pub body: Value,
}

/// In-memory transport that records every payload.
///
/// URLs registered with [`MemoryTransport::fail_url`] are rejected with
/// HTTP 503 and not recorded.
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<SentPayload>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryTransport {
    /// Create an empty recording transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every post to `url`.
    pub fn fail_url(&self, url: impl Into<String>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(url.into());
        }
    }

    /// Payloads delivered so far.
    pub fn sent(&self) -> Vec<SentPayload> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Payloads delivered to URLs containing `fragment`.
    pub fn sent_to(&self, fragment: &str) -> Vec<SentPayload> {
        self.sent()
            .into_iter()
            .filter(|p| p.url.contains(fragment))
            .collect()
    }
}

#[async_trait]
impl WebhookTransport for MemoryTransport {
    async fn post_json(&self, url: &str, body: &Value) -> AlertResult<()> {
        let rejected = self
            .failing
            .lock()
            .map(|f| f.contains(url))
            .unwrap_or(false);

        if rejected {
            return Err(AlertError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentPayload {
                url: url.to_string(),
                body: body.clone(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
