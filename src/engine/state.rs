//! Per-monitor mutable engine state: status, history, remediation gating.
//!
//! Kept as keyed maps behind a single `RwLock` rather than one task per
//! monitor — coarse locking, but cancellation and snapshot reads stay
//! trivial, which matters more at this workload's scale.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::models::{MonitorHistoryEntry, MonitorStatus};

const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct MonitorState {
    pub last_status: MonitorStatus,
    pub last_check: Option<DateTime<Utc>>,
    pub history: Vec<MonitorHistoryEntry>,
    pub remediate_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub next_run: Option<DateTime<Utc>>,
}

impl MonitorState {
    /// Append-front, cap at 50.
    pub fn push_history(&mut self, entry: MonitorHistoryEntry) {
        self.history.insert(0, entry);
        if self.history.len() > HISTORY_CAPACITY {
            self.history.truncate(HISTORY_CAPACITY);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshotEntry {
    pub status: MonitorStatus,
    pub last_check: Option<DateTime<Utc>>,
}

/// Engine-wide map of per-monitor state, guarded by one reader-writer lock.
/// Readers (snapshot/history queries) take shared access; writers
/// (post-probe updates, remediation gating) take exclusive access.
#[derive(Default)]
pub struct EngineState {
    monitors: RwLock<HashMap<String, MonitorState>>,
}

impl EngineState {
    pub fn new() -> Self {
        EngineState { monitors: RwLock::new(HashMap::new()) }
    }

    pub fn status_snapshot(&self) -> HashMap<String, StatusSnapshotEntry> {
        let guard = self.monitors.read().unwrap();
        guard
            .iter()
            .map(|(id, s)| {
                (
                    id.clone(),
                    StatusSnapshotEntry { status: s.last_status, last_check: s.last_check },
                )
            })
            .collect()
    }

    pub fn history(&self, id: &str) -> Vec<MonitorHistoryEntry> {
        let guard = self.monitors.read().unwrap();
        guard.get(id).map(|s| s.history.clone()).unwrap_or_default()
    }

    pub fn last_status(&self, id: &str) -> MonitorStatus {
        let guard = self.monitors.read().unwrap();
        guard.get(id).map(|s| s.last_status).unwrap_or_default()
    }

    /// Mark a paused monitor: status becomes `Paused`, `last_check` bumps,
    /// scheduling fields are left untouched so a resume doesn't fire an
    /// immediate burst of backlog probes.
    pub fn mark_paused(&self, id: &str, now: DateTime<Utc>) {
        let mut guard = self.monitors.write().unwrap();
        let entry = guard.entry(id.to_string()).or_default();
        entry.last_status = MonitorStatus::Paused;
        entry.last_check = Some(now);
    }

    /// Should a probe for `id` be dispatched at `now`, given `interval`?
    /// If so, re-arm `next_run` and return true — this is the single gate
    /// that enforces at most one probe in flight per monitor.
    pub fn try_arm(&self, id: &str, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        let mut guard = self.monitors.write().unwrap();
        let entry = guard.entry(id.to_string()).or_default();
        match entry.next_run {
            Some(next) if now < next => false,
            _ => {
                entry.next_run = Some(now + interval);
                true
            }
        }
    }

    /// Fold a completed probe into state and report whether this was a
    /// status transition (and if so, the previous status) — the caller uses
    /// that to decide whether to emit a notification.
    pub fn record_result(
        &self,
        id: &str,
        entry: MonitorHistoryEntry,
    ) -> (MonitorStatus, bool) {
        let mut guard = self.monitors.write().unwrap();
        let state = guard.entry(id.to_string()).or_default();
        let prev = state.last_status;
        let status = entry.status;
        let checked_at = entry.checked_at;

        state.push_history(entry);
        state.last_status = status;
        state.last_check = Some(checked_at);

        if status == MonitorStatus::Up && prev != MonitorStatus::Up {
            state.attempts = 0;
        }

        (prev, status != prev)
    }

    /// Remediation gate: evaluated and applied atomically under the
    /// exclusive lock, released before the caller performs any I/O.
    pub fn try_gate_remediation(
        &self,
        id: &str,
        now: DateTime<Utc>,
        max_attempts: u32,
        cooldown: chrono::Duration,
    ) -> Option<u32> {
        let mut guard = self.monitors.write().unwrap();
        let state = guard.entry(id.to_string()).or_default();

        if let Some(remediate_at) = state.remediate_at {
            if now < remediate_at {
                return None;
            }
        }
        if state.attempts >= max_attempts {
            return None;
        }

        state.attempts += 1;
        state.remediate_at = Some(now + cooldown);
        Some(state.attempts)
    }

    /// Drop state for monitor ids no longer present in the current Store
    /// snapshot. Safe to skip entirely — this is opportunistic housekeeping,
    /// not a correctness requirement.
    pub fn gc_missing(&self, live_ids: &std::collections::HashSet<String>) {
        let mut guard = self.monitors.write().unwrap();
        guard.retain(|id, _| live_ids.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn entry(status: MonitorStatus, checked_at: DateTime<Utc>) -> MonitorHistoryEntry {
        MonitorHistoryEntry { status, checked_at, latency_ms: 1, message: String::new() }
    }

    #[test]
    fn history_append_bounded_to_fifty_newest_first() {
        let state = EngineState::new();
        let base = Utc::now();
        for i in 0..60 {
            state.record_result("m1", entry(MonitorStatus::Up, base + ChronoDuration::seconds(i)));
        }
        let history = state.history("m1");
        assert_eq!(history.len(), 50);
        // newest first: the last-appended entry (i=59) is at index 0.
        assert_eq!(history[0].checked_at, base + ChronoDuration::seconds(59));
        assert_eq!(history[49].checked_at, base + ChronoDuration::seconds(10));
    }

    #[test]
    fn try_arm_enforces_single_in_flight_probe() {
        let state = EngineState::new();
        let now = Utc::now();
        let interval = ChronoDuration::seconds(5);
        assert!(state.try_arm("m1", now, interval));
        // Re-checking before the interval elapses must not re-arm.
        assert!(!state.try_arm("m1", now, interval));
        assert!(!state.try_arm("m1", now + ChronoDuration::seconds(4), interval));
        assert!(state.try_arm("m1", now + ChronoDuration::seconds(5), interval));
    }

    #[test]
    fn remediation_gate_respects_cooldown_and_max_attempts() {
        let state = EngineState::new();
        let t0 = Utc::now();
        let cooldown = ChronoDuration::seconds(10);

        // t=0: first failing probe, gate passes.
        assert_eq!(state.try_gate_remediation("m1", t0, 2, cooldown), Some(1));
        // t=5: still within cooldown, gate blocks.
        assert_eq!(state.try_gate_remediation("m1", t0 + ChronoDuration::seconds(5), 2, cooldown), None);
        // t=10: cooldown elapsed, second attempt allowed.
        assert_eq!(state.try_gate_remediation("m1", t0 + ChronoDuration::seconds(10), 2, cooldown), Some(2));
        // t=20: attempts cap (2) reached, gate blocks even though cooldown elapsed.
        assert_eq!(state.try_gate_remediation("m1", t0 + ChronoDuration::seconds(20), 2, cooldown), None);
    }

    #[test]
    fn attempts_reset_on_first_up_after_non_up() {
        let state = EngineState::new();
        let t0 = Utc::now();
        state.try_gate_remediation("m1", t0, 5, ChronoDuration::seconds(5));
        state.try_gate_remediation("m1", t0 + ChronoDuration::seconds(10), 5, ChronoDuration::seconds(5));

        let (_, _) = state.record_result("m1", entry(MonitorStatus::Down, t0));
        let (prev, changed) = state.record_result("m1", entry(MonitorStatus::Up, t0 + ChronoDuration::seconds(20)));
        assert_eq!(prev, MonitorStatus::Down);
        assert!(changed);

        // attempts reset to 0 means the next gate check starts a fresh count.
        assert_eq!(state.try_gate_remediation("m1", t0 + ChronoDuration::seconds(30), 1, ChronoDuration::seconds(5)), Some(1));
    }
}
