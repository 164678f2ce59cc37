//! Persistent store: monitors and notification channels.
//!
//! SQLite-backed — a single `Mutex<Connection>` and an `execute_batch`
//! migration run at construction. The engine never touches SQLite directly;
//! it only sees the `Store` trait below, which it calls once per tick.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    generate_id, now_rfc3339, ChannelType, LogPolicy, Monitor, MonitorInput, MonitorKind,
    NotificationChannel, NotificationChannelInput, RemediationAction, RemediationPolicy,
    RestartPolicy, RestartPolicyName,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Read-only snapshot of monitors and notifications for the engine, plus the
/// append-only mutation surface the HTTP API needs. Behind a trait so the
/// engine never depends on the concrete storage engine.
pub trait Store: Send + Sync {
    fn snapshot_monitors(&self) -> Result<Vec<Monitor>, StoreError>;
    fn get_monitor(&self, id: &str) -> Result<Monitor, StoreError>;
    fn create_monitor(&self, input: MonitorInput) -> Result<Monitor, StoreError>;
    fn update_monitor(&self, id: &str, input: MonitorInput) -> Result<Monitor, StoreError>;
    fn delete_monitor(&self, id: &str) -> Result<(), StoreError>;
    fn set_paused(&self, id: &str, paused: bool) -> Result<Monitor, StoreError>;

    fn list_notification_channels(&self) -> Result<Vec<NotificationChannel>, StoreError>;
    fn get_notification_channel(&self, id: &str) -> Result<NotificationChannel, StoreError>;
    fn create_notification_channel(
        &self,
        input: NotificationChannelInput,
    ) -> Result<NotificationChannel, StoreError>;
    fn update_notification_channel(
        &self,
        id: &str,
        input: NotificationChannelInput,
    ) -> Result<NotificationChannel, StoreError>;
    fn delete_notification_channel(&self, id: &str) -> Result<(), StoreError>;

    /// Resolves a monitor's `notifyWebhookIds` entries against the store:
    /// tries `id` match, falls back to `name` match.
    fn resolve_notification_channel(&self, id_or_name: &str) -> Option<NotificationChannel>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;
        let store = SqliteStore { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS monitors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                paused INTEGER NOT NULL DEFAULT 0,
                interval_seconds INTEGER NOT NULL DEFAULT 60,
                timeout_seconds INTEGER NOT NULL DEFAULT 10,
                notify_webhook_ids TEXT NOT NULL DEFAULT '',
                url TEXT,
                container_id TEXT,
                restart_policy_name TEXT,
                restart_policy_max_retry INTEGER,
                remediation_action TEXT NOT NULL DEFAULT 'none',
                remediation_max_attempts INTEGER NOT NULL DEFAULT 0,
                remediation_cooldown_seconds INTEGER NOT NULL DEFAULT 30,
                logs_include INTEGER NOT NULL DEFAULT 0,
                logs_tail INTEGER NOT NULL DEFAULT 100,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notification_channels (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                channel_type TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notification_channels_name ON notification_channels(name);
            ",
        )?;
        Ok(())
    }

    fn upsert(&self, id: &str, input: &MonitorInput, created_at: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        let notify_ids = input.notify_webhook_ids.join(",");
        let updated_at = now_rfc3339();

        let (url, container_id, rp_name, rp_max_retry, action, max_attempts, cooldown, include, tail) =
            match &input.kind {
                MonitorKind::Http { url } => {
                    (Some(url.clone()), None, None, None, "none".to_string(), 0, 30, 0i32, 1i64)
                }
                MonitorKind::Container { container_id, restart_policy, remediation, logs } => (
                    None,
                    Some(container_id.clone()),
                    restart_policy.as_ref().map(|r| r.name.as_str().to_string()),
                    restart_policy.as_ref().map(|r| r.maximum_retry_count as i64),
                    remediation.action.to_db_str().to_string(),
                    remediation.max_attempts as i64,
                    remediation.cooldown_seconds as i64,
                    logs.include as i32,
                    logs.tail as i64,
                ),
            };

        conn.execute(
            "INSERT INTO monitors (
                id, name, kind, paused, interval_seconds, timeout_seconds, notify_webhook_ids,
                url, container_id, restart_policy_name, restart_policy_max_retry,
                remediation_action, remediation_max_attempts, remediation_cooldown_seconds,
                logs_include, logs_tail, created_at, updated_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
            ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, kind=excluded.kind, paused=excluded.paused,
                interval_seconds=excluded.interval_seconds, timeout_seconds=excluded.timeout_seconds,
                notify_webhook_ids=excluded.notify_webhook_ids, url=excluded.url,
                container_id=excluded.container_id, restart_policy_name=excluded.restart_policy_name,
                restart_policy_max_retry=excluded.restart_policy_max_retry,
                remediation_action=excluded.remediation_action,
                remediation_max_attempts=excluded.remediation_max_attempts,
                remediation_cooldown_seconds=excluded.remediation_cooldown_seconds,
                logs_include=excluded.logs_include, logs_tail=excluded.logs_tail,
                updated_at=excluded.updated_at",
            params![
                id,
                input.name,
                input.kind.type_name(),
                input.paused as i32,
                input.interval_seconds,
                input.timeout_seconds,
                notify_ids,
                url,
                container_id,
                rp_name,
                rp_max_retry,
                action,
                max_attempts,
                cooldown,
                include,
                tail,
                created_at,
                updated_at,
            ],
        )?;
        Ok(())
    }
}

impl RemediationAction {
    fn to_db_str(self) -> &'static str {
        match self {
            RemediationAction::None => "none",
            RemediationAction::Start => "start",
            RemediationAction::Restart => "restart",
        }
    }

    fn from_db_str(s: &str) -> Self {
        match s {
            "start" => RemediationAction::Start,
            "restart" => RemediationAction::Restart,
            _ => RemediationAction::None,
        }
    }
}

fn row_to_monitor(row: &Row) -> rusqlite::Result<Monitor> {
    let kind_tag: String = row.get("kind")?;
    let notify_raw: String = row.get("notify_webhook_ids")?;
    let notify_webhook_ids = if notify_raw.is_empty() {
        Vec::new()
    } else {
        notify_raw.split(',').map(|s| s.to_string()).collect()
    };

    let kind = if kind_tag == "container" {
        let restart_policy = match row.get::<_, Option<String>>("restart_policy_name")? {
            Some(name) => RestartPolicyName::parse(&name).map(|name| RestartPolicy {
                name,
                maximum_retry_count: row
                    .get::<_, Option<i64>>("restart_policy_max_retry")?
                    .unwrap_or(0) as u32,
            }),
            None => None,
        };
        let action_str: String = row.get("remediation_action")?;
        MonitorKind::Container {
            container_id: row.get("container_id")?,
            restart_policy,
            remediation: RemediationPolicy {
                action: RemediationAction::from_db_str(&action_str),
                max_attempts: row.get::<_, i64>("remediation_max_attempts")? as u32,
                cooldown_seconds: row.get::<_, i64>("remediation_cooldown_seconds")? as u32,
            },
            logs: LogPolicy {
                include: row.get::<_, i32>("logs_include")? != 0,
                tail: row.get::<_, i64>("logs_tail")? as u32,
            },
        }
    } else {
        MonitorKind::Http { url: row.get::<_, Option<String>>("url")?.unwrap_or_default() }
    };

    Ok(Monitor {
        id: row.get("id")?,
        name: row.get("name")?,
        paused: row.get::<_, i32>("paused")? != 0,
        interval_seconds: row.get::<_, i64>("interval_seconds")? as u32,
        timeout_seconds: row.get::<_, i64>("timeout_seconds")? as u32,
        notify_webhook_ids,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        kind,
    })
}

fn row_to_channel(row: &Row) -> rusqlite::Result<NotificationChannel> {
    let channel_type: String = row.get("channel_type")?;
    Ok(NotificationChannel {
        id: row.get("id")?,
        name: row.get("name")?,
        channel_type: ChannelType::parse(&channel_type).unwrap_or(ChannelType::Webhook),
        url: row.get("url")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl Store for SqliteStore {
    fn snapshot_monitors(&self) -> Result<Vec<Monitor>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM monitors ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], row_to_monitor)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn get_monitor(&self, id: &str) -> Result<Monitor, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM monitors WHERE id = ?1", params![id], row_to_monitor)
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn create_monitor(&self, input: MonitorInput) -> Result<Monitor, StoreError> {
        let id = input.id.clone().unwrap_or_else(generate_id);
        let created_at = now_rfc3339();
        self.upsert(&id, &input, &created_at)?;
        self.get_monitor(&id)
    }

    fn update_monitor(&self, id: &str, input: MonitorInput) -> Result<Monitor, StoreError> {
        let existing = self.get_monitor(id)?;
        self.upsert(id, &input, &existing.created_at)?;
        self.get_monitor(id)
    }

    fn delete_monitor(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM monitors WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn set_paused(&self, id: &str, paused: bool) -> Result<Monitor, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE monitors SET paused = ?1, updated_at = ?2 WHERE id = ?3",
            params![paused as i32, now_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        drop(conn);
        self.get_monitor(id)
    }

    fn list_notification_channels(&self) -> Result<Vec<NotificationChannel>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM notification_channels ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], row_to_channel)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn get_notification_channel(&self, id: &str) -> Result<NotificationChannel, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM notification_channels WHERE id = ?1",
            params![id],
            row_to_channel,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn create_notification_channel(
        &self,
        input: NotificationChannelInput,
    ) -> Result<NotificationChannel, StoreError> {
        let id = generate_id();
        let now = now_rfc3339();
        let channel_type = ChannelType::parse(&input.channel_type)
            .ok_or_else(|| StoreError::Backend(format!("unknown channel type: {}", input.channel_type)))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO notification_channels (id, name, channel_type, url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, input.name, channel_type.as_str(), input.url, now],
        )?;
        drop(conn);
        self.get_notification_channel(&id)
    }

    fn update_notification_channel(
        &self,
        id: &str,
        input: NotificationChannelInput,
    ) -> Result<NotificationChannel, StoreError> {
        let channel_type = ChannelType::parse(&input.channel_type)
            .ok_or_else(|| StoreError::Backend(format!("unknown channel type: {}", input.channel_type)))?;
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE notification_channels SET name=?1, channel_type=?2, url=?3, updated_at=?4 WHERE id=?5",
            params![input.name, channel_type.as_str(), input.url, now_rfc3339(), id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        drop(conn);
        self.get_notification_channel(id)
    }

    fn delete_notification_channel(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM notification_channels WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn resolve_notification_channel(&self, id_or_name: &str) -> Option<NotificationChannel> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM notification_channels WHERE id = ?1",
            params![id_or_name],
            row_to_channel,
        )
        .optional()
        .ok()
        .flatten()
        .or_else(|| {
            conn.query_row(
                "SELECT * FROM notification_channels WHERE name = ?1",
                params![id_or_name],
                row_to_channel,
            )
            .optional()
            .ok()
            .flatten()
        })
    }
}
