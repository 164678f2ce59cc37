//! Data model: monitors, statuses, history, notification channels.
//!
//! Internally a monitor is a tagged union (`MonitorKind`) so an HTTP monitor
//! can never carry container-only fields like `remediation`. The HTTP API's
//! wire format stays flattened/optional for client compatibility; the
//! `routes` layer is responsible for the translation at the boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Unknown,
    Up,
    Down,
    Paused,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        MonitorStatus::Unknown
    }
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorStatus::Unknown => "unknown",
            MonitorStatus::Up => "up",
            MonitorStatus::Down => "down",
            MonitorStatus::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyName {
    No,
    Always,
    OnFailure,
    UnlessStopped,
}

impl RestartPolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestartPolicyName::No => "no",
            RestartPolicyName::Always => "always",
            RestartPolicyName::OnFailure => "on-failure",
            RestartPolicyName::UnlessStopped => "unless-stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no" => Some(RestartPolicyName::No),
            "always" => Some(RestartPolicyName::Always),
            "on-failure" => Some(RestartPolicyName::OnFailure),
            "unless-stopped" => Some(RestartPolicyName::UnlessStopped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub name: RestartPolicyName,
    pub maximum_retry_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationAction {
    None,
    Start,
    Restart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationPolicy {
    pub action: RemediationAction,
    pub max_attempts: u32,
    pub cooldown_seconds: u32,
}

impl RemediationPolicy {
    /// Cooldown is clamped to a floor of 5s, mirroring the interval floor.
    pub fn effective_cooldown_seconds(&self) -> u32 {
        self.cooldown_seconds.max(5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPolicy {
    pub include: bool,
    pub tail: u32,
}

impl Default for LogPolicy {
    fn default() -> Self {
        LogPolicy { include: false, tail: 100 }
    }
}

impl LogPolicy {
    pub fn effective_tail(&self) -> u32 {
        self.tail.max(1)
    }
}

/// The variant payload of a monitor. Illegal combinations (e.g. an HTTP
/// monitor carrying a remediation policy) are unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorKind {
    Http {
        url: String,
    },
    Container {
        container_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        restart_policy: Option<RestartPolicy>,
        remediation: RemediationPolicy,
        logs: LogPolicy,
    },
}

impl MonitorKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            MonitorKind::Http { .. } => "http",
            MonitorKind::Container { .. } => "container",
        }
    }

    /// The human-facing "target" string used in notification payloads: the
    /// URL for HTTP monitors, the container id for container monitors.
    pub fn target(&self) -> &str {
        match self {
            MonitorKind::Http { url } => url,
            MonitorKind::Container { container_id, .. } => container_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub name: String,
    pub paused: bool,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    #[serde(default)]
    pub notify_webhook_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub kind: MonitorKind,
}

impl Monitor {
    /// Intervals under 5 seconds clamp to 5.
    pub fn effective_interval_seconds(&self) -> u32 {
        self.interval_seconds.max(5)
    }

    /// `timeoutSeconds < 1` clamps to 1.
    pub fn effective_timeout_seconds(&self) -> u32 {
        self.timeout_seconds.max(1)
    }
}

/// Input shape for `POST /monitors` — mirrors `Monitor` but `id` is optional
/// and timestamps are server-assigned.
#[derive(Debug, Deserialize)]
pub struct MonitorInput {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub paused: bool,
    pub interval_seconds: u32,
    pub timeout_seconds: u32,
    #[serde(default)]
    pub notify_webhook_ids: Vec<String>,
    #[serde(flatten)]
    pub kind: MonitorKind,
}

/// One completed probe, before it's folded into a monitor's history.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub monitor_id: String,
    pub status: MonitorStatus,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub latency_ms: u64,
    pub message: String,
}

/// `CheckResult` minus `monitor_id` — what's actually retained in history.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorHistoryEntry {
    pub status: MonitorStatus,
    pub checked_at: chrono::DateTime<chrono::Utc>,
    pub latency_ms: u64,
    pub message: String,
}

impl From<&CheckResult> for MonitorHistoryEntry {
    fn from(r: &CheckResult) -> Self {
        MonitorHistoryEntry {
            status: r.status,
            checked_at: r.checked_at,
            latency_ms: r.latency_ms,
            message: r.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Webhook,
    Dingtalk,
    Wechat,
    Discord,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Webhook => "webhook",
            ChannelType::Dingtalk => "dingtalk",
            ChannelType::Wechat => "wechat",
            ChannelType::Discord => "discord",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(ChannelType::Webhook),
            "dingtalk" => Some(ChannelType::Dingtalk),
            "wechat" => Some(ChannelType::Wechat),
            "discord" => Some(ChannelType::Discord),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub channel_type: ChannelType,
    pub url: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationChannelInput {
    pub name: String,
    pub channel_type: String,
    pub url: String,
}

/// Generate an opaque 128-bit lowercase-hex monitor/channel id.
pub fn generate_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_32_char_lowercase_hex() {
        let id = generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    fn http_monitor(interval_seconds: u32, timeout_seconds: u32) -> Monitor {
        Monitor {
            id: generate_id(),
            name: "web".to_string(),
            paused: false,
            interval_seconds,
            timeout_seconds,
            notify_webhook_ids: vec![],
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            kind: MonitorKind::Http { url: "https://example.test".to_string() },
        }
    }

    #[test]
    fn interval_below_five_clamps_to_five() {
        for raw in [0, 1, 4] {
            assert_eq!(http_monitor(raw, 5).effective_interval_seconds(), 5);
        }
        assert_eq!(http_monitor(30, 5).effective_interval_seconds(), 30);
    }

    #[test]
    fn timeout_zero_clamps_to_one_second() {
        assert_eq!(http_monitor(5, 0).effective_timeout_seconds(), 1);
        assert_eq!(http_monitor(5, 10).effective_timeout_seconds(), 10);
    }

    #[test]
    fn cooldown_below_five_clamps_to_five() {
        let policy = RemediationPolicy { action: RemediationAction::Restart, max_attempts: 1, cooldown_seconds: 2 };
        assert_eq!(policy.effective_cooldown_seconds(), 5);
        let policy = RemediationPolicy { action: RemediationAction::Restart, max_attempts: 1, cooldown_seconds: 30 };
        assert_eq!(policy.effective_cooldown_seconds(), 30);
    }

    #[test]
    fn log_tail_zero_clamps_to_one() {
        let policy = LogPolicy { include: true, tail: 0 };
        assert_eq!(policy.effective_tail(), 1);
    }
}
