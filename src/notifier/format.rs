//! Per-channel payload rendering. One function per wire shape; the
//! markdown-based channels (dingtalk/wechat/discord) share `compose_markdown`.

use serde_json::{json, Value};

use crate::models::ChannelType;

use super::Event;

pub fn render(channel_type: ChannelType, event: &Event) -> Value {
    match channel_type {
        ChannelType::Webhook => serde_json::to_value(event).unwrap_or(Value::Null),
        ChannelType::Dingtalk => {
            let text = compose_markdown(event);
            json!({
                "msgtype": "markdown",
                "markdown": { "title": event.event_type.alert_title(), "text": text },
            })
        }
        ChannelType::Wechat => {
            let content = compose_markdown(event);
            json!({ "msgtype": "markdown", "markdown": { "content": content } })
        }
        ChannelType::Discord => {
            let color = if event.data.current.as_deref() == Some("down") { 0xdc3545 } else { 0x5cdd8b };
            json!({
                "username": "Uptime Chopper",
                "embeds": [{
                    "title": event.event_type.alert_title(),
                    "description": compose_markdown(event),
                    "color": color,
                    "timestamp": event.at.to_rfc3339(),
                }],
            })
        }
    }
}

/// Bullet-list markdown body shared by dingtalk/wechat/discord.
fn compose_markdown(event: &Event) -> String {
    let mut lines = vec![format!("## {}", event.event_type.alert_title())];

    lines.push(format!("- **Monitor**: {}", event.data.monitor_name));
    lines.push(format!("- **Target**: {}", event.data.target));

    if let Some(current) = &event.data.current {
        let dot = if current == "down" { "🔴" } else { "🟢" };
        lines.push(format!("- **Status**: {dot} {current}"));
    }

    lines.push(format!("- **Time**: {}", event.at.format("%Y-%m-%d %H:%M:%S")));
    lines.push(format!("- **Message**: {}", event.data.message));

    if let Some(latency) = event.data.latency_ms {
        lines.push(format!("- **Latency**: {latency} ms"));
    }
    if let Some(action) = &event.data.action {
        lines.push(format!("- **Remediation**: {action}"));
    }
    if let Some(attempt) = event.data.attempt {
        lines.push(format!("- **Attempt**: {attempt}"));
    }

    if let Some(logs) = &event.logs {
        const TAIL_CHARS: usize = 1000;
        let char_count = logs.content.chars().count();
        let tail: String = if char_count > TAIL_CHARS {
            logs.content.chars().skip(char_count - TAIL_CHARS).collect()
        } else {
            logs.content.clone()
        };
        let prefix = if char_count > TAIL_CHARS { "...(truncated)\n" } else { "" };
        lines.push(format!("```\n{prefix}{tail}\n```"));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{EventData, EventType, LogsAttachment};
    use chrono::{TimeZone, Utc};

    fn sample_event() -> Event {
        Event {
            event_type: EventType::StatusChanged,
            monitor_id: "abc".to_string(),
            at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            data: EventData {
                monitor_name: "web".to_string(),
                target: "https://example.test".to_string(),
                previous: Some("up".to_string()),
                current: Some("down".to_string()),
                message: "503 Service Unavailable".to_string(),
                latency_ms: Some(42),
                action: None,
                attempt: None,
            },
            logs: None,
        }
    }

    #[test]
    fn webhook_serializes_canonical_payload_verbatim() {
        let event = sample_event();
        let rendered = render(ChannelType::Webhook, &event);
        assert_eq!(rendered["monitorId"], "abc");
        assert_eq!(rendered["data"]["current"], "down");
    }

    #[test]
    fn dingtalk_wraps_markdown() {
        let event = sample_event();
        let rendered = render(ChannelType::Dingtalk, &event);
        assert_eq!(rendered["msgtype"], "markdown");
        assert!(rendered["markdown"]["text"].as_str().unwrap().contains("🔴 down"));
    }

    #[test]
    fn discord_color_reflects_current_status() {
        let down = sample_event();
        let rendered = render(ChannelType::Discord, &down);
        assert_eq!(rendered["embeds"][0]["color"], 0xdc3545);

        let mut up = sample_event();
        up.data.current = Some("up".to_string());
        let rendered = render(ChannelType::Discord, &up);
        assert_eq!(rendered["embeds"][0]["color"], 0x5cdd8b);
    }

    #[test]
    fn markdown_truncates_log_tail_to_1000_chars() {
        let mut event = sample_event();
        let long_content: String = "x".repeat(1500);
        event.logs = Some(LogsAttachment {
            container_id: "c1".to_string(),
            content: long_content,
            truncated: false,
        });
        let rendered = render(ChannelType::Wechat, &event);
        let content = rendered["markdown"]["content"].as_str().unwrap();
        assert!(content.contains("...(truncated)"));
        let fence_body = content.split("```").nth(1).unwrap();
        let tail_len = fence_body.trim_start_matches("...(truncated)\n").trim_end_matches('\n').chars().count();
        assert_eq!(tail_len, 1000);
    }
}
