//! Capability layer over a local container runtime.
//!
//! The engine never talks to `bollard` directly — it goes through the
//! `ContainerClient` trait, so a missing/unreachable runtime degrades to the
//! deterministic in-memory fallback instead of taking the whole process down.

mod docker;
mod mock;

pub use docker::DockerContainerClient;
pub use mock::MockContainerClient;

use std::collections::HashMap;
use std::time::Duration;

use crate::models::{RestartPolicy, RestartPolicyName};

#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: HashMap<String, String>,
    pub restart_policy: Option<RestartPolicy>,
}

#[derive(Debug, Clone)]
pub struct LogsFetch {
    pub content: Vec<u8>,
    pub truncated: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("container runtime error: {0}")]
    Transport(String),
}

impl ContainerError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Thin capability set a probe/remediation needs from a container runtime.
/// Implemented by `DockerContainerClient` (bollard-backed) and
/// `MockContainerClient` (deterministic, in-memory fallback).
#[async_trait::async_trait]
pub trait ContainerClient: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ContainerError>;

    async fn container_state(&self, id: &str) -> Result<String, ContainerError>;

    async fn start(&self, id: &str) -> Result<(), ContainerError>;

    async fn stop(&self, id: &str, timeout: Duration) -> Result<(), ContainerError>;

    async fn restart(&self, id: &str, timeout: Duration) -> Result<(), ContainerError>;

    async fn update_restart_policy(
        &self,
        id: &str,
        name: RestartPolicyName,
        maximum_retry_count: u32,
    ) -> Result<(), ContainerError>;

    /// Fetch up to `tail` lines of logs since `since`, demultiplexed into a
    /// single byte buffer and capped at `max_bytes`.
    async fn logs(
        &self,
        id: &str,
        tail: u32,
        since: chrono::DateTime<chrono::Utc>,
        max_bytes: usize,
    ) -> Result<LogsFetch, ContainerError>;

    /// Liveness of the real runtime — `false` once the fallback has kicked in.
    fn has_docker(&self) -> bool;
}

/// Build the best available `ContainerClient`: a real Docker-compatible
/// connection if one can be established within 2s, else the in-memory mock.
/// The decision is made once, here, at construction.
pub async fn connect() -> Box<dyn ContainerClient> {
    match docker::DockerContainerClient::connect().await {
        Ok(client) => Box::new(client),
        Err(e) => {
            eprintln!("container runtime unavailable ({e}), falling back to mock client");
            Box::new(MockContainerClient::new())
        }
    }
}
