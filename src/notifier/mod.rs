//! Renders engine events into per-channel wire formats and delivers them over
//! HTTP: a thin struct wrapping a `reqwest::Client`, with one render function
//! per channel shape (webhook, dingtalk, wechat, discord).

mod format;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::NotificationChannel;

/// Bounded excerpt of container logs attached to an event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsAttachment {
    pub container_id: String,
    pub content: String,
    pub truncated: bool,
}

/// The canonical, channel-agnostic event payload. This is the one wire shape
/// in the crate that's camelCase rather than snake_case — the webhook
/// channel serializes it verbatim, so the field names here (`monitorId`,
/// `latencyMs`, ...) are the actual wire keys subscribers see.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub monitor_id: String,
    pub at: DateTime<Utc>,
    pub data: EventData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogsAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChanged,
    Remediated,
    Error,
}

impl EventType {
    fn label(self) -> &'static str {
        match self {
            EventType::StatusChanged => "Status Changed",
            EventType::Remediated => "Remediated",
            EventType::Error => "Error",
        }
    }
}

/// Channel-agnostic fields populated by the Engine.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub monitor_name: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
#[error("notification delivery to {channel} failed: {detail}")]
pub struct DeliveryError {
    pub channel: String,
    pub detail: String,
}

/// Resolves monitor webhook references and delivers a rendered event to each.
/// Delivery is always best-effort — callers log failures and move on.
pub struct Notifier {
    client: reqwest::Client,
    legacy_webhooks: HashMap<String, String>,
}

impl Notifier {
    pub fn new(legacy_webhooks: HashMap<String, String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build notifier HTTP client");
        Notifier { client, legacy_webhooks }
    }

    /// Resolves a monitor's `notifyWebhookIds` element against the store
    /// (id, then name), falling back to the legacy name-keyed config map.
    pub fn resolve<'a>(
        &'a self,
        id_or_name: &str,
        store_lookup: impl FnOnce(&str) -> Option<NotificationChannel>,
    ) -> Option<ResolvedChannel<'a>> {
        if let Some(channel) = store_lookup(id_or_name) {
            return Some(ResolvedChannel::Store(channel));
        }
        self.legacy_webhooks.get(id_or_name).map(|url| ResolvedChannel::Legacy { name: id_or_name.to_string(), url: url.clone() })
    }

    /// Render and POST `event` to `channel`. Returns a `DeliveryError` describing
    /// the failure; never panics, never retries.
    pub async fn deliver(&self, channel: &ResolvedChannel<'_>, event: &Event) -> Result<(), DeliveryError> {
        let (name, channel_type, url) = match channel {
            ResolvedChannel::Store(c) => (c.name.as_str(), c.channel_type, c.url.as_str()),
            ResolvedChannel::Legacy { name, url } => (name.as_str(), crate::models::ChannelType::Webhook, url.as_str()),
        };

        let body = format::render(channel_type, event);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError { channel: name.to_string(), detail: e.to_string() })?;

        let status = response.status();
        let response_body = response.text().await.unwrap_or_default();

        if status.as_u16() >= 400 {
            return Err(DeliveryError {
                channel: name.to_string(),
                detail: format!("HTTP {status}: {response_body}"),
            });
        }

        if channel_type == crate::models::ChannelType::Dingtalk {
            if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&response_body) {
                let errcode = parsed.get("errcode").and_then(|v| v.as_i64()).unwrap_or(0);
                if errcode != 0 {
                    let errmsg = parsed.get("errmsg").and_then(|v| v.as_str()).unwrap_or("unknown error");
                    return Err(DeliveryError {
                        channel: name.to_string(),
                        detail: format!("dingtalk errcode {errcode}: {errmsg}"),
                    });
                }
            }
        }

        Ok(())
    }
}

pub enum ResolvedChannel<'a> {
    Store(NotificationChannel),
    Legacy { name: String, url: String },
}

impl EventType {
    pub fn alert_title(self) -> String {
        format!("Monitor Alert: {}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_title_translates_event_type() {
        assert_eq!(EventType::StatusChanged.alert_title(), "Monitor Alert: Status Changed");
        assert_eq!(EventType::Remediated.alert_title(), "Monitor Alert: Remediated");
    }

    #[test]
    fn resolve_prefers_store_then_legacy() {
        let mut legacy = HashMap::new();
        legacy.insert("ops".to_string(), "https://legacy.test/ops".to_string());
        let notifier = Notifier::new(legacy);

        let resolved = notifier.resolve("ops", |_| None);
        assert!(matches!(resolved, Some(ResolvedChannel::Legacy { .. })));

        let resolved = notifier.resolve("missing", |_| None);
        assert!(resolved.is_none());
    }
}
