//! Deterministic in-memory fallback used when no real container runtime is
//! reachable at startup. Three fixed sample containers, mutated in place by
//! start/stop/restart so the rest of the engine sees realistic state
//! transitions in a Docker-less dev environment.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{ContainerClient, ContainerError, ContainerSummary, LogsFetch};
use crate::models::{RestartPolicy, RestartPolicyName};

struct MockContainer {
    summary: ContainerSummary,
    log_lines: Vec<String>,
}

pub struct MockContainerClient {
    containers: Mutex<HashMap<String, MockContainer>>,
}

impl MockContainerClient {
    pub fn new() -> Self {
        let mut containers = HashMap::new();
        for (id, name, image, state) in [
            ("mock-web-1", "web", "nginx:alpine", "running"),
            ("mock-worker-1", "worker", "uptime-chopper/worker:latest", "running"),
            ("mock-cache-1", "cache", "redis:7", "exited"),
        ] {
            containers.insert(
                id.to_string(),
                MockContainer {
                    summary: ContainerSummary {
                        id: id.to_string(),
                        name: name.to_string(),
                        names: vec![name.to_string()],
                        image: image.to_string(),
                        state: state.to_string(),
                        status: state.to_string(),
                        labels: HashMap::new(),
                        restart_policy: Some(RestartPolicy {
                            name: RestartPolicyName::No,
                            maximum_retry_count: 0,
                        }),
                    },
                    log_lines: vec![
                        format!("[{name}] starting up"),
                        format!("[{name}] ready to accept connections"),
                    ],
                },
            );
        }
        MockContainerClient { containers: Mutex::new(containers) }
    }

    fn get(
        &self,
        id: &str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, MockContainer>>, ContainerError> {
        let guard = self.containers.lock().unwrap();
        if guard.contains_key(id) {
            Ok(guard)
        } else {
            Err(ContainerError::NotFound(id.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl ContainerClient for MockContainerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        let guard = self.containers.lock().unwrap();
        Ok(guard.values().map(|c| c.summary.clone()).collect())
    }

    async fn container_state(&self, id: &str) -> Result<String, ContainerError> {
        let guard = self.get(id)?;
        Ok(guard[id].summary.state.clone())
    }

    async fn start(&self, id: &str) -> Result<(), ContainerError> {
        let mut guard = self.get(id)?;
        let c = guard.get_mut(id).unwrap();
        c.summary.state = "running".to_string();
        c.summary.status = "running".to_string();
        c.log_lines.push(format!("[{}] started", c.summary.name));
        Ok(())
    }

    async fn stop(&self, id: &str, _timeout: Duration) -> Result<(), ContainerError> {
        let mut guard = self.get(id)?;
        let c = guard.get_mut(id).unwrap();
        c.summary.state = "exited".to_string();
        c.summary.status = "exited (0)".to_string();
        c.log_lines.push(format!("[{}] stopped", c.summary.name));
        Ok(())
    }

    async fn restart(&self, id: &str, _timeout: Duration) -> Result<(), ContainerError> {
        let mut guard = self.get(id)?;
        let c = guard.get_mut(id).unwrap();
        c.summary.state = "running".to_string();
        c.summary.status = "running".to_string();
        c.log_lines.push(format!("[{}] restarted", c.summary.name));
        Ok(())
    }

    async fn update_restart_policy(
        &self,
        id: &str,
        name: RestartPolicyName,
        maximum_retry_count: u32,
    ) -> Result<(), ContainerError> {
        let mut guard = self.get(id)?;
        let c = guard.get_mut(id).unwrap();
        c.summary.restart_policy = Some(RestartPolicy { name, maximum_retry_count });
        Ok(())
    }

    async fn logs(
        &self,
        id: &str,
        tail: u32,
        _since: chrono::DateTime<chrono::Utc>,
        max_bytes: usize,
    ) -> Result<LogsFetch, ContainerError> {
        let guard = self.get(id)?;
        let c = &guard[id];
        let take = tail as usize;
        let lines: Vec<&String> = c.log_lines.iter().rev().take(take).collect();
        let mut content = lines
            .into_iter()
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes();
        let truncated = content.len() > max_bytes;
        content.truncate(max_bytes);
        Ok(LogsFetch { content, truncated })
    }

    fn has_docker(&self) -> bool {
        false
    }
}
