//! Alert wiring for the keeper processes.

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use stakeops_alerts::{
    AlertChannel, AlertDispatcher, DispatchOutcome, PagerDutyChannel, SlackChannel,
    TelegramChannel, WebhookTransport,
};
use stakeops_domain::{AlertDetails, Severity};
use stakeops_keeper::KeeperMetrics;

use crate::config::AlertConfig;

/// Build a dispatcher with every channel that has credentials configured.
pub fn build_dispatcher(config: &AlertConfig, transport: Arc<dyn WebhookTransport>) -> AlertDispatcher {
    let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();

    if let Some(telegram) = &config.telegram {
        channels.push(Arc::new(TelegramChannel::new(
            telegram.bot_token.clone(),
            telegram.chat_id.clone(),
            transport.clone(),
        )));
    }
    if let Some(url) = &config.slack_webhook_url {
        channels.push(Arc::new(SlackChannel::new(url.clone(), transport.clone())));
    }
    if let Some(key) = &config.pagerduty_routing_key {
        channels.push(Arc::new(PagerDutyChannel::new(key.clone(), transport)));
    }

    let dispatcher = AlertDispatcher::new(channels);
    info!(channels = ?dispatcher.channel_names(), "Alert channels configured");
    dispatcher
}

/// Build alert details from key/value pairs.
pub fn details<I, K>(pairs: I) -> AlertDetails
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Dispatcher handle that also counts alerts in the process metrics.
#[derive(Clone)]
pub struct Alerter {
    dispatcher: Arc<AlertDispatcher>,
    metrics: Arc<KeeperMetrics>,
}

impl Alerter {
    /// Wrap a dispatcher.
    pub fn new(dispatcher: Arc<AlertDispatcher>, metrics: Arc<KeeperMetrics>) -> Self {
        Self {
            dispatcher,
            metrics,
        }
    }

    /// Raise an alert.
    pub async fn raise(
        &self,
        severity: Severity,
        message: impl Into<String>,
        details: AlertDetails,
    ) -> DispatchOutcome {
        let outcome = self.dispatcher.send_alert(severity, message, details).await;
        self.metrics.record_alert(severity, outcome.is_dispatched());
        outcome
    }
}
