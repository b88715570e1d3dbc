//! Notification channels and their payload contracts.
//!
//! | Channel | Severities | Payload |
//! |---------|-----------|---------|
//! | Telegram | all | `{chat_id, text, parse_mode}` |
//! | Slack | all | `{attachments: [{color, title, text, ts}]}` |
//! | PagerDuty | critical | `{routing_key, event_action, payload: {summary, severity, source}}` |

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use stakeops_domain::{Alert, Severity};

use crate::error::AlertResult;
use crate::transport::WebhookTransport;

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// PagerDuty Events v2 endpoint
pub const PAGERDUTY_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// `source` reported to PagerDuty
const ALERT_SOURCE: &str = "stakeops";

// =============================================================================
// Channel Port
// =============================================================================

/// A notification destination.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Channel name used in logs.
    fn name(&self) -> &'static str;

    /// Whether alerts of `severity` are routed to this channel.
    fn accepts(&self, _severity: Severity) -> bool {
        true
    }

    /// Deliver one alert.
    async fn deliver(&self, alert: &Alert) -> AlertResult<()>;
}

fn severity_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🚨",
        Severity::Warning => "⚠️",
        Severity::Info => "ℹ️",
    }
}

fn details_lines(alert: &Alert) -> Vec<String> {
    alert
        .details
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}: {}", k, s),
            other => format!("{}: {}", k, other),
        })
        .collect()
}

// =============================================================================
// Telegram
// =============================================================================

/// Telegram `sendMessage` channel.
pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
    transport: Arc<dyn WebhookTransport>,
}

impl TelegramChannel {
    /// Create a channel posting to the public Bot API.
    pub fn new(bot_token: String, chat_id: String, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            bot_token,
            chat_id,
            transport,
        }
    }

    /// `sendMessage` URL for the configured bot.
    pub fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", TELEGRAM_API_URL, self.bot_token)
    }

    /// Build the `sendMessage` body.
    pub fn payload(&self, alert: &Alert) -> Value {
        let mut text = format!(
            "{} *{}*\n\n{}",
            severity_emoji(alert.severity),
            alert.severity.as_str().to_uppercase(),
            alert.message
        );

        let details = details_lines(alert);
        if !details.is_empty() {
            text.push_str("\n\n");
            text.push_str(&details.join("\n"));
        }

        json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "Markdown",
        })
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn deliver(&self, alert: &Alert) -> AlertResult<()> {
        self.transport.post_json(&self.url(), &self.payload(alert)).await
    }
}

// =============================================================================
// Slack
// =============================================================================

/// Slack incoming-webhook channel.
pub struct SlackChannel {
    webhook_url: String,
    transport: Arc<dyn WebhookTransport>,
}

impl SlackChannel {
    /// Create a channel posting to `webhook_url`.
    pub fn new(webhook_url: String, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            webhook_url,
            transport,
        }
    }

    /// Build the attachment payload.
    pub fn payload(&self, alert: &Alert) -> Value {
        let color = match alert.severity {
            Severity::Critical => "danger",
            Severity::Warning => "warning",
            Severity::Info => "good",
        };

        let mut text = alert.message.clone();
        let details = details_lines(alert);
        if !details.is_empty() {
            text.push('\n');
            text.push_str(&details.join("\n"));
        }

        json!({
            "attachments": [{
                "color": color,
                "title": format!("{} Stakeops {} alert", severity_emoji(alert.severity), alert.severity),
                "text": text,
                "ts": alert.timestamp.timestamp(),
            }]
        })
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, alert: &Alert) -> AlertResult<()> {
        self.transport
            .post_json(&self.webhook_url, &self.payload(alert))
            .await
    }
}

// =============================================================================
// PagerDuty
// =============================================================================

/// PagerDuty Events v2 channel. Only critical alerts page.
pub struct PagerDutyChannel {
    routing_key: String,
    transport: Arc<dyn WebhookTransport>,
}

impl PagerDutyChannel {
    /// Create a channel posting to the public Events v2 endpoint.
    pub fn new(routing_key: String, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            routing_key,
            transport,
        }
    }

    /// Build the trigger event.
    pub fn payload(&self, alert: &Alert) -> Value {
        json!({
            "routing_key": self.routing_key,
            "event_action": "trigger",
            "payload": {
                "summary": alert.message,
                "severity": alert.severity.as_str(),
                "source": ALERT_SOURCE,
            }
        })
    }
}

#[async_trait]
impl AlertChannel for PagerDutyChannel {
    fn name(&self) -> &'static str {
        "pagerduty"
    }

    fn accepts(&self, severity: Severity) -> bool {
        severity == Severity::Critical
    }

    async fn deliver(&self, alert: &Alert) -> AlertResult<()> {
        self.transport
            .post_json(PAGERDUTY_EVENTS_URL, &self.payload(alert))
            .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use chrono::{TimeZone, Utc};
    use stakeops_domain::AlertDetails;

    fn alert(severity: Severity) -> Alert {
        let mut details = AlertDetails::new();
        details.insert("buffer".to_string(), json!("12.5"));
        Alert::new(
            severity,
            "Liquidity buffer below minimum",
            details,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_telegram_payload() {
        let channel = TelegramChannel::new(
            "TOKEN".to_string(),
            "42".to_string(),
            Arc::new(MemoryTransport::new()),
        );
        let payload = channel.payload(&alert(Severity::Warning));

        assert_eq!(payload["chat_id"], "42");
        assert_eq!(payload["parse_mode"], "Markdown");
        let text = payload["text"].as_str().unwrap();
        assert!(text.contains("*WARNING*"));
        assert!(text.contains("Liquidity buffer below minimum"));
        assert!(text.contains("buffer: 12.5"));
        assert_eq!(channel.url(), "https://api.telegram.org/botTOKEN/sendMessage");
    }

    #[test]
    fn test_slack_payload() {
        let channel = SlackChannel::new("https://hooks.slack.test/x".to_string(), Arc::new(MemoryTransport::new()));
        let payload = channel.payload(&alert(Severity::Critical));

        let attachment = &payload["attachments"][0];
        assert_eq!(attachment["color"], "danger");
        assert_eq!(attachment["ts"], 1_704_067_200i64);
        assert!(attachment["title"].as_str().unwrap().contains("critical"));
        assert!(attachment["text"].as_str().unwrap().starts_with("Liquidity buffer below minimum"));
    }

    #[test]
    fn test_pagerduty_payload_and_routing() {
        let channel = PagerDutyChannel::new("RK".to_string(), Arc::new(MemoryTransport::new()));
        let payload = channel.payload(&alert(Severity::Critical));

        assert_eq!(payload["routing_key"], "RK");
        assert_eq!(payload["event_action"], "trigger");
        assert_eq!(payload["payload"]["summary"], "Liquidity buffer below minimum");
        assert_eq!(payload["payload"]["severity"], "critical");
        assert_eq!(payload["payload"]["source"], "stakeops");

        assert!(channel.accepts(Severity::Critical));
        assert!(!channel.accepts(Severity::Warning));
        assert!(!channel.accepts(Severity::Info));
    }

    #[tokio::test]
    async fn test_deliver_posts_to_transport() {
        let transport = Arc::new(MemoryTransport::new());
        let channel = SlackChannel::new("https://hooks.slack.test/x".to_string(), transport.clone());

        channel.deliver(&alert(Severity::Info)).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://hooks.slack.test/x");
    }
}
