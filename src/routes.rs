//! HTTP API façade: CRUD over monitors/notifications, engine snapshots, and
//! container control. Handlers return `(Status, Json<Value>)` error tuples,
//! extract shared state via `&State<Arc<T>>`, and validate before touching
//! the store. No auth or rate-limiting here — this service has neither.

use std::sync::Arc;
use std::time::Duration;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, post, put, State};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::container::ContainerClient;
use crate::engine::Engine;
use crate::models::{Monitor, MonitorInput, NotificationChannel, NotificationChannelInput, RestartPolicyName};
use crate::store::{Store, StoreError};

type ApiError = (Status, Json<serde_json::Value>);

fn err(status: Status, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into(), "code": code })))
}

fn store_err(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(id) => err(Status::NotFound, "NOT_FOUND", format!("not found: {id}")),
        StoreError::Backend(msg) => err(Status::InternalServerError, "INTERNAL_ERROR", msg),
    }
}

fn container_err(e: crate::container::ContainerError) -> ApiError {
    err(Status::ServiceUnavailable, "CONTAINER_RUNTIME_ERROR", e.message())
}

// ── Health ──

#[get("/health")]
pub fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

// ── Monitors ──

#[get("/monitors")]
pub fn list_monitors(store: &State<Arc<dyn Store>>) -> Result<Json<Vec<Monitor>>, ApiError> {
    Ok(Json(store.snapshot_monitors().map_err(store_err)?))
}

#[get("/monitors/<id>")]
pub fn get_monitor(id: &str, store: &State<Arc<dyn Store>>) -> Result<Json<Monitor>, ApiError> {
    Ok(Json(store.get_monitor(id).map_err(store_err)?))
}

fn validate_monitor_input(input: &MonitorInput) -> Result<(), ApiError> {
    if input.name.trim().is_empty() {
        return Err(err(Status::BadRequest, "VALIDATION_ERROR", "name is required"));
    }
    match &input.kind {
        crate::models::MonitorKind::Http { url } if url.trim().is_empty() => {
            Err(err(Status::BadRequest, "VALIDATION_ERROR", "url is required for an http monitor"))
        }
        crate::models::MonitorKind::Container { container_id, .. } if container_id.trim().is_empty() => {
            Err(err(Status::BadRequest, "VALIDATION_ERROR", "containerId is required for a container monitor"))
        }
        _ => Ok(()),
    }
}

#[post("/monitors", format = "json", data = "<input>")]
pub fn create_monitor(
    input: Json<MonitorInput>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<Monitor>, ApiError> {
    let input = input.into_inner();
    validate_monitor_input(&input)?;
    Ok(Json(store.create_monitor(input).map_err(store_err)?))
}

#[put("/monitors/<id>", format = "json", data = "<input>")]
pub fn update_monitor(
    id: &str,
    input: Json<MonitorInput>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<Monitor>, ApiError> {
    let input = input.into_inner();
    validate_monitor_input(&input)?;
    Ok(Json(store.update_monitor(id, input).map_err(store_err)?))
}

#[delete("/monitors/<id>")]
pub fn delete_monitor(id: &str, store: &State<Arc<dyn Store>>) -> Result<Json<serde_json::Value>, ApiError> {
    store.delete_monitor(id).map_err(store_err)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[post("/monitors/<id>/pause")]
pub fn pause_monitor(id: &str, store: &State<Arc<dyn Store>>) -> Result<Json<Monitor>, ApiError> {
    Ok(Json(store.set_paused(id, true).map_err(store_err)?))
}

#[post("/monitors/<id>/resume")]
pub fn resume_monitor(id: &str, store: &State<Arc<dyn Store>>) -> Result<Json<Monitor>, ApiError> {
    Ok(Json(store.set_paused(id, false).map_err(store_err)?))
}

#[get("/monitors/<id>/history")]
pub fn get_history(
    id: &str,
    store: &State<Arc<dyn Store>>,
    engine: &State<Arc<Engine>>,
) -> Result<Json<Vec<crate::models::MonitorHistoryEntry>>, ApiError> {
    store.get_monitor(id).map_err(store_err)?;
    Ok(Json(engine.history(id)))
}

// ── Status snapshot ──

#[get("/status")]
pub fn status_snapshot(engine: &State<Arc<Engine>>) -> Json<serde_json::Value> {
    let snapshot = engine.status_snapshot();
    let status: serde_json::Map<String, serde_json::Value> = snapshot
        .into_iter()
        .map(|(id, entry)| {
            (
                id,
                serde_json::json!({
                    "status": entry.status.as_str(),
                    "lastCheck": entry.last_check.map(|t| t.to_rfc3339()),
                }),
            )
        })
        .collect();
    Json(serde_json::json!({ "status": status }))
}

// ── Notifications ──

#[get("/notifications")]
pub fn list_notifications(store: &State<Arc<dyn Store>>) -> Result<Json<Vec<NotificationChannel>>, ApiError> {
    Ok(Json(store.list_notification_channels().map_err(store_err)?))
}

#[get("/notifications/<id>")]
pub fn get_notification(id: &str, store: &State<Arc<dyn Store>>) -> Result<Json<NotificationChannel>, ApiError> {
    Ok(Json(store.get_notification_channel(id).map_err(store_err)?))
}

#[post("/notifications", format = "json", data = "<input>")]
pub fn create_notification(
    input: Json<NotificationChannelInput>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<NotificationChannel>, ApiError> {
    let input = input.into_inner();
    if input.name.trim().is_empty() || input.url.trim().is_empty() {
        return Err(err(Status::BadRequest, "VALIDATION_ERROR", "name and url are required"));
    }
    Ok(Json(store.create_notification_channel(input).map_err(store_err)?))
}

#[put("/notifications/<id>", format = "json", data = "<input>")]
pub fn update_notification(
    id: &str,
    input: Json<NotificationChannelInput>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<NotificationChannel>, ApiError> {
    Ok(Json(store.update_notification_channel(id, input.into_inner()).map_err(store_err)?))
}

#[delete("/notifications/<id>")]
pub fn delete_notification(id: &str, store: &State<Arc<dyn Store>>) -> Result<Json<serde_json::Value>, ApiError> {
    store.delete_notification_channel(id).map_err(store_err)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ── Containers ──

#[get("/containers")]
pub async fn list_containers(
    container: &State<Arc<dyn ContainerClient>>,
) -> Result<Json<Vec<ContainerSummaryDto>>, ApiError> {
    let summaries = container.list_containers().await.map_err(container_err)?;
    Ok(Json(summaries.into_iter().map(ContainerSummaryDto::from).collect()))
}

#[derive(Debug, serde::Serialize)]
pub struct ContainerSummaryDto {
    pub id: String,
    pub name: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: std::collections::HashMap<String, String>,
    pub restart_policy: Option<crate::models::RestartPolicy>,
}

impl From<crate::container::ContainerSummary> for ContainerSummaryDto {
    fn from(s: crate::container::ContainerSummary) -> Self {
        ContainerSummaryDto {
            id: s.id,
            name: s.name,
            names: s.names,
            image: s.image,
            state: s.state,
            status: s.status,
            labels: s.labels,
            restart_policy: s.restart_policy,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TimeoutBody {
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[get("/containers/<id>/logs?<tail>&<since_seconds>")]
pub async fn container_logs(
    id: &str,
    tail: Option<u32>,
    since_seconds: Option<u64>,
    container: &State<Arc<dyn ContainerClient>>,
    config: &State<AppConfig>,
) -> Result<(rocket::http::ContentType, Vec<u8>), ApiError> {
    let tail = tail.unwrap_or(100).max(1);
    let since_secs = since_seconds.unwrap_or(config.default_docker_log_since_secs);
    let since = chrono::Utc::now() - chrono::Duration::seconds(since_secs as i64);
    let fetch = container.logs(id, tail, since, config.max_docker_log_bytes).await.map_err(container_err)?;
    Ok((rocket::http::ContentType::Plain, fetch.content))
}

#[post("/containers/<id>/start")]
pub async fn start_container(id: &str, container: &State<Arc<dyn ContainerClient>>) -> Result<Json<serde_json::Value>, ApiError> {
    container.start(id).await.map_err(container_err)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[post("/containers/<id>/stop", format = "json", data = "<body>")]
pub async fn stop_container(
    id: &str,
    body: Option<Json<TimeoutBody>>,
    container: &State<Arc<dyn ContainerClient>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let timeout = Duration::from_secs(body.and_then(|b| b.into_inner().timeout_seconds).unwrap_or(10));
    container.stop(id, timeout).await.map_err(container_err)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[post("/containers/<id>/restart", format = "json", data = "<body>")]
pub async fn restart_container(
    id: &str,
    body: Option<Json<TimeoutBody>>,
    container: &State<Arc<dyn ContainerClient>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let timeout = Duration::from_secs(body.and_then(|b| b.into_inner().timeout_seconds).unwrap_or(10));
    container.restart(id, timeout).await.map_err(container_err)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct RestartPolicyBody {
    pub name: String,
    pub maximum_retry_count: u32,
}

#[put("/containers/<id>/restart-policy", format = "json", data = "<body>")]
pub async fn update_restart_policy(
    id: &str,
    body: Json<RestartPolicyBody>,
    container: &State<Arc<dyn ContainerClient>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = body.into_inner();
    let name = RestartPolicyName::parse(&body.name)
        .ok_or_else(|| err(Status::BadRequest, "VALIDATION_ERROR", format!("unknown restart policy name: {}", body.name)))?;
    container.update_restart_policy(id, name, body.maximum_retry_count).await.map_err(container_err)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MockContainerClient;
    use crate::notifier::Notifier;
    use crate::store::SqliteStore;
    use rocket::local::blocking::Client;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn test_client() -> Client {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(":memory:").unwrap());
        let container: Arc<dyn ContainerClient> = Arc::new(MockContainerClient::new());
        let notifier = Arc::new(Notifier::new(HashMap::new()));
        let engine = Arc::new(Engine::new(store.clone(), container.clone(), notifier, 65536, Duration::from_secs(3600)));

        let config = AppConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            database_path: ":memory:".to_string(),
            legacy_webhooks: HashMap::new(),
            max_docker_log_bytes: 65536,
            default_docker_log_since_secs: 3600,
            cors_origin: "*".to_string(),
            serve_frontend: false,
            frontend_dir: String::new(),
        };

        let rocket = rocket::build()
            .manage(store)
            .manage(container)
            .manage(engine)
            .manage(config)
            .mount(
                "/api",
                rocket::routes![
                    health,
                    list_monitors,
                    get_monitor,
                    create_monitor,
                    update_monitor,
                    delete_monitor,
                    pause_monitor,
                    resume_monitor,
                    get_history,
                    status_snapshot,
                    list_notifications,
                    get_notification,
                    create_notification,
                    update_notification,
                    delete_notification,
                    list_containers,
                    container_logs,
                    start_container,
                    stop_container,
                    restart_container,
                    update_restart_policy,
                ],
            );
        Client::tracked(rocket).expect("valid rocket instance")
    }

    #[test]
    fn health_ok() {
        let client = test_client();
        let response = client.get("/api/health").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_json::<serde_json::Value>().unwrap()["ok"], true);
    }

    #[test]
    fn create_then_get_monitor() {
        let client = test_client();
        let body = serde_json::json!({
            "name": "web", "interval_seconds": 30, "timeout_seconds": 5,
            "type": "http", "url": "https://example.test"
        });
        let response = client.post("/api/monitors").json(&body).dispatch();
        assert_eq!(response.status(), Status::Ok);
        let created: Monitor = response.into_json().unwrap();

        let response = client.get(format!("/api/monitors/{}", created.id)).dispatch();
        assert_eq!(response.status(), Status::Ok);
    }

    #[test]
    fn create_monitor_missing_url_is_validation_error() {
        let client = test_client();
        let body = serde_json::json!({
            "name": "web", "interval_seconds": 30, "timeout_seconds": 5,
            "type": "http", "url": ""
        });
        let response = client.post("/api/monitors").json(&body).dispatch();
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[test]
    fn get_missing_monitor_is_404() {
        let client = test_client();
        let response = client.get("/api/monitors/does-not-exist").dispatch();
        assert_eq!(response.status(), Status::NotFound);
    }

    #[test]
    fn pause_then_resume_monitor() {
        let client = test_client();
        let body = serde_json::json!({
            "name": "web", "interval_seconds": 30, "timeout_seconds": 5,
            "type": "http", "url": "https://example.test"
        });
        let created: Monitor = client.post("/api/monitors").json(&body).dispatch().into_json().unwrap();

        let response = client.post(format!("/api/monitors/{}/pause", created.id)).dispatch();
        let paused: Monitor = response.into_json().unwrap();
        assert!(paused.paused);

        let response = client.post(format!("/api/monitors/{}/resume", created.id)).dispatch();
        let resumed: Monitor = response.into_json().unwrap();
        assert!(!resumed.paused);
    }

    #[test]
    fn list_mock_containers() {
        let client = test_client();
        let response = client.get("/api/containers").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let containers: Vec<ContainerSummaryDto> = response.into_json().unwrap();
        assert_eq!(containers.len(), 3);
    }

    #[test]
    fn status_snapshot_reflects_paused_monitor() {
        let client = test_client();
        let body = serde_json::json!({
            "name": "web", "interval_seconds": 30, "timeout_seconds": 5,
            "type": "http", "url": "https://example.test"
        });
        let created: Monitor = client.post("/api/monitors").json(&body).dispatch().into_json().unwrap();
        client.post(format!("/api/monitors/{}/pause", created.id)).dispatch();

        let response = client.get("/api/status").dispatch();
        assert_eq!(response.status(), Status::Ok);
    }
}
