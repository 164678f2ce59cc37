//! Central scheduler: ticks at 1 Hz, dispatches probes, applies transition
//! rules, drives remediation, and emits notifications. Per-monitor mutable
//! state lives in `state::EngineState`; single-probe mechanics live in
//! `probe`. A background tokio task ticks every monitor each second and
//! dispatches its probe concurrently when due, with elapsed-time-gated
//! housekeeping passes running inline at the top of the tick.

pub mod probe;
pub mod state;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::container::ContainerClient;
use crate::models::{Monitor, MonitorHistoryEntry, MonitorKind, MonitorStatus, RemediationAction};
use crate::notifier::{Event, EventData, EventType, Notifier};
use crate::store::Store;

pub use state::{EngineState, StatusSnapshotEntry};

const RETENTION_INTERVAL: Duration = Duration::from_secs(3600);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(300);
const RESTART_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Engine {
    store: Arc<dyn Store>,
    container: Arc<dyn ContainerClient>,
    notifier: Arc<Notifier>,
    state: EngineState,
    http_client: reqwest::Client,
    max_log_bytes: usize,
    default_log_since: Duration,
    cancel: CancellationToken,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        container: Arc<dyn ContainerClient>,
        notifier: Arc<Notifier>,
        max_log_bytes: usize,
        default_log_since: Duration,
    ) -> Self {
        Engine {
            store,
            container,
            notifier,
            state: EngineState::new(),
            http_client: reqwest::Client::new(),
            max_log_bytes,
            default_log_since,
            cancel: CancellationToken::new(),
            scheduler_handle: Mutex::new(None),
        }
    }

    /// Begins background scheduling. Idempotent: a second call while
    /// already running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut handle_slot = self.scheduler_handle.lock().unwrap();
        if handle_slot.is_some() {
            return;
        }
        let engine = Arc::clone(self);
        *handle_slot = Some(tokio::spawn(async move { engine.scheduler_loop().await }));
    }

    /// Requests cancellation and blocks until the scheduler and every
    /// in-flight probe have observed it and exited.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.scheduler_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn status_snapshot(&self) -> std::collections::HashMap<String, StatusSnapshotEntry> {
        self.state.status_snapshot()
    }

    pub fn history(&self, id: &str) -> Vec<MonitorHistoryEntry> {
        self.state.history(id)
    }

    async fn scheduler_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut tasks = JoinSet::new();
        let mut last_retention = Instant::now() - RETENTION_INTERVAL;
        let mut last_health_log = Instant::now() - HEALTH_LOG_INTERVAL;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(&mut tasks, &mut last_retention, &mut last_health_log).await;
                }
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain in-flight probes before returning control to `stop()`. Every
        // probe is deadline-bounded, so this terminates within the longest
        // monitor timeout of cancellation.
        while tasks.join_next().await.is_some() {}
    }

    async fn tick(
        self: &Arc<Self>,
        tasks: &mut JoinSet<()>,
        last_retention: &mut Instant,
        last_health_log: &mut Instant,
    ) {
        let now = Utc::now();

        let monitors = match self.store.snapshot_monitors() {
            Ok(monitors) => monitors,
            Err(e) => {
                eprintln!("engine: store read failed, skipping tick: {e}");
                return;
            }
        };

        if last_retention.elapsed() >= RETENTION_INTERVAL {
            let live_ids: HashSet<String> = monitors.iter().map(|m| m.id.clone()).collect();
            self.state.gc_missing(&live_ids);
            *last_retention = Instant::now();
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            self.log_status_summary(&monitors);
            *last_health_log = Instant::now();
        }

        for monitor in monitors {
            if monitor.paused {
                self.state.mark_paused(&monitor.id, now);
                continue;
            }

            let interval = chrono::Duration::seconds(monitor.effective_interval_seconds() as i64);
            if self.state.try_arm(&monitor.id, now, interval) {
                let engine = Arc::clone(self);
                tasks.spawn(async move { engine.run_probe(monitor).await });
            }
        }
    }

    fn log_status_summary(&self, monitors: &[Monitor]) {
        let snapshot = self.status_snapshot();
        let mut up = 0;
        let mut down = 0;
        let mut unknown = 0;
        let mut paused = 0;
        for m in monitors {
            match snapshot.get(&m.id).map(|s| s.status).unwrap_or_default() {
                MonitorStatus::Up => up += 1,
                MonitorStatus::Down => down += 1,
                MonitorStatus::Paused => paused += 1,
                MonitorStatus::Unknown => unknown += 1,
            }
        }
        println!("engine: {} monitors — {up} up, {down} down, {paused} paused, {unknown} unknown", monitors.len());
    }

    async fn run_probe(self: Arc<Self>, monitor: Monitor) {
        let timeout = Duration::from_secs(monitor.effective_timeout_seconds() as u64);

        let (result, logs, remediation_event) = match &monitor.kind {
            MonitorKind::Http { url } => {
                let result = probe::probe_http(&monitor.id, url, timeout, &self.http_client).await;
                (result, None, None)
            }
            MonitorKind::Container { container_id, restart_policy, remediation, logs } => {
                let outcome = probe::probe_container(&monitor.id, container_id, timeout, self.container.as_ref()).await;

                let mut remediation_event = None;
                if outcome.needs_reconciliation {
                    if let Some(rp) = restart_policy {
                        let _ = self
                            .container
                            .update_restart_policy(container_id, rp.name, rp.maximum_retry_count)
                            .await;
                    }
                    remediation_event = self.try_remediate(&monitor.id, container_id, remediation).await;
                }

                let logs_attachment = if outcome.attempt_logs && logs.include {
                    probe::fetch_log_attachment(
                        self.container.as_ref(),
                        container_id,
                        logs.effective_tail(),
                        self.default_log_since,
                        self.max_log_bytes,
                    )
                    .await
                } else {
                    None
                };

                (outcome.result, logs_attachment, remediation_event)
            }
        };

        if let Some((action, attempt)) = &remediation_event {
            self.emit(
                &monitor,
                EventType::Remediated,
                EventData {
                    monitor_name: monitor.name.clone(),
                    target: monitor.kind.target().to_string(),
                    previous: None,
                    current: None,
                    message: result.message.clone(),
                    latency_ms: Some(result.latency_ms),
                    action: Some(format!("{action:?}").to_lowercase()),
                    attempt: Some(*attempt),
                },
                None,
            )
            .await;
        }

        let entry = MonitorHistoryEntry::from(&result);
        let (prev, changed) = self.state.record_result(&monitor.id, entry);

        if changed {
            self.emit(
                &monitor,
                EventType::StatusChanged,
                EventData {
                    monitor_name: monitor.name.clone(),
                    target: monitor.kind.target().to_string(),
                    previous: Some(prev.as_str().to_string()),
                    current: Some(result.status.as_str().to_string()),
                    message: result.message.clone(),
                    latency_ms: Some(result.latency_ms),
                    action: None,
                    attempt: None,
                },
                logs,
            )
            .await;
        }
    }

    /// Remediation gate-check-and-act: the gate itself runs under
    /// `EngineState`'s exclusive lock and releases before any I/O; the
    /// container action happens afterward, outside the lock.
    async fn try_remediate(
        &self,
        monitor_id: &str,
        container_id: &str,
        policy: &crate::models::RemediationPolicy,
    ) -> Option<(RemediationAction, u32)> {
        if policy.action == RemediationAction::None || policy.max_attempts == 0 {
            return None;
        }

        let cooldown = chrono::Duration::seconds(policy.effective_cooldown_seconds() as i64);
        let attempt = self.state.try_gate_remediation(monitor_id, Utc::now(), policy.max_attempts, cooldown)?;

        let outcome = match policy.action {
            RemediationAction::Start => self.container.start(container_id).await,
            RemediationAction::Restart => self.container.restart(container_id, RESTART_TIMEOUT).await,
            RemediationAction::None => unreachable!(),
        };

        match outcome {
            Ok(()) => Some((policy.action, attempt)),
            Err(e) => {
                eprintln!("engine: remediation {:?} failed for {monitor_id}: {}", policy.action, e.message());
                None
            }
        }
    }

    async fn emit(&self, monitor: &Monitor, event_type: EventType, data: EventData, logs: Option<crate::notifier::LogsAttachment>) {
        let event = Event { event_type, monitor_id: monitor.id.clone(), at: Utc::now(), data, logs };

        for id_or_name in &monitor.notify_webhook_ids {
            let store = Arc::clone(&self.store);
            let resolved = self.notifier.resolve(id_or_name, |id| store.resolve_notification_channel(id));
            let Some(channel) = resolved else { continue };
            if let Err(e) = self.notifier.deliver(&channel, &event).await {
                eprintln!("engine: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MockContainerClient;
    use crate::models::{generate_id, now_rfc3339, LogPolicy, MonitorInput, RemediationPolicy};
    use crate::store::SqliteStore;
    use std::collections::HashMap;

    fn test_engine() -> Arc<Engine> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(":memory:").unwrap());
        let container: Arc<dyn ContainerClient> = Arc::new(MockContainerClient::new());
        let notifier = Arc::new(Notifier::new(HashMap::new()));
        Arc::new(Engine::new(store, container, notifier, 65536, Duration::from_secs(3600)))
    }

    #[tokio::test]
    async fn paused_monitor_marks_status_without_probing() {
        let engine = test_engine();
        let id = generate_id();
        engine.state.mark_paused(&id, Utc::now());
        assert_eq!(engine.state.last_status(&id), MonitorStatus::Paused);
    }

    #[tokio::test]
    async fn container_transition_resets_attempts_on_up() {
        let engine = test_engine();
        let monitor = Monitor {
            id: generate_id(),
            name: "worker".to_string(),
            paused: false,
            interval_seconds: 5,
            timeout_seconds: 5,
            notify_webhook_ids: vec![],
            created_at: now_rfc3339(),
            updated_at: now_rfc3339(),
            kind: MonitorKind::Container {
                container_id: "mock-cache-1".to_string(),
                restart_policy: None,
                remediation: RemediationPolicy { action: RemediationAction::Restart, max_attempts: 2, cooldown_seconds: 5 },
                logs: LogPolicy { include: false, tail: 10 },
            },
        };

        // mock-cache-1 starts "exited" — first probe is down and triggers a
        // gated restart, which flips the mock container to "running".
        engine.clone().run_probe(monitor.clone()).await;
        assert_eq!(engine.state.last_status(&monitor.id), MonitorStatus::Down);

        engine.clone().run_probe(monitor.clone()).await;
        assert_eq!(engine.state.last_status(&monitor.id), MonitorStatus::Up);
    }

    #[test]
    fn monitor_input_roundtrips_through_store() {
        let store = SqliteStore::new(":memory:").unwrap();
        let input = MonitorInput {
            id: None,
            name: "web".to_string(),
            paused: false,
            interval_seconds: 5,
            timeout_seconds: 5,
            notify_webhook_ids: vec![],
            kind: MonitorKind::Http { url: "https://example.test".to_string() },
        };
        let created = store.create_monitor(input).unwrap();
        assert_eq!(created.name, "web");
    }
}
