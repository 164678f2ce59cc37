//! Bollard-backed `ContainerClient`: connect-with-local-defaults,
//! `ContainerSummary` listing, `LogsOptions`/`LogOutput` for the
//! already-demuxed log stream, `UpdateContainerOptions` for restart-policy
//! reconciliation.

use std::time::Duration;

use bollard::container::{
    LogOutput, LogsOptions, RestartContainerOptions, StopContainerOptions,
    UpdateContainerOptions,
};
use bollard::models::RestartPolicyNameEnum;
use bollard::Docker;
use futures_util::StreamExt;

use super::{ContainerClient, ContainerError, ContainerSummary, LogsFetch};
use crate::models::{RestartPolicy, RestartPolicyName};

pub struct DockerContainerClient {
    docker: Docker,
}

impl DockerContainerClient {
    /// Connect to the local runtime and confirm it's alive with a 2s-bounded
    /// ping. The fallback decision belongs to the caller (`connect()` in
    /// `container::mod`) — this just surfaces success/failure.
    pub async fn connect() -> Result<Self, bollard::errors::Error> {
        let docker = Docker::connect_with_local_defaults()?;
        tokio::time::timeout(Duration::from_secs(2), docker.ping())
            .await
            .map_err(|_| bollard::errors::Error::DockerResponseServerError {
                status_code: 0,
                message: "ping timed out".into(),
            })??;
        Ok(DockerContainerClient { docker })
    }

    fn map_err(id: &str, e: bollard::errors::Error) -> ContainerError {
        match &e {
            bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
                ContainerError::NotFound(id.to_string())
            }
            other => ContainerError::Transport(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl ContainerClient for DockerContainerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, ContainerError> {
        let summaries = self
            .docker
            .list_containers::<String>(None)
            .await
            .map_err(|e| ContainerError::Transport(e.to_string()))?;

        let mut out = Vec::with_capacity(summaries.len());
        for c in summaries {
            let id = c.id.unwrap_or_default();
            let names: Vec<String> = c
                .names
                .unwrap_or_default()
                .into_iter()
                .map(|n| n.strip_prefix('/').map(str::to_string).unwrap_or(n))
                .collect();
            let name = names.first().cloned().unwrap_or_else(|| id.clone());
            let restart_policy = restart_policy_of(&self.docker, &id).await;
            out.push(ContainerSummary {
                id,
                name,
                names,
                image: c.image.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
                restart_policy,
            });
        }
        Ok(out)
    }

    async fn container_state(&self, id: &str) -> Result<String, ContainerError> {
        let info = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| Self::map_err(id, e))?;
        Ok(info
            .state
            .and_then(|s| s.status)
            .map(|s| format!("{s:?}").to_lowercase())
            .unwrap_or_else(|| "unknown".to_string()))
    }

    async fn start(&self, id: &str) -> Result<(), ContainerError> {
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| Self::map_err(id, e))
    }

    async fn stop(&self, id: &str, timeout: Duration) -> Result<(), ContainerError> {
        let options = StopContainerOptions { t: timeout.as_secs() as i64 };
        self.docker
            .stop_container(id, Some(options))
            .await
            .map_err(|e| Self::map_err(id, e))
    }

    async fn restart(&self, id: &str, timeout: Duration) -> Result<(), ContainerError> {
        let options = RestartContainerOptions { t: timeout.as_secs() as i64 };
        self.docker
            .restart_container(id, Some(options))
            .await
            .map_err(|e| Self::map_err(id, e))
    }

    async fn update_restart_policy(
        &self,
        id: &str,
        name: RestartPolicyName,
        maximum_retry_count: u32,
    ) -> Result<(), ContainerError> {
        let name_enum = match name {
            RestartPolicyName::No => RestartPolicyNameEnum::NO,
            RestartPolicyName::Always => RestartPolicyNameEnum::ALWAYS,
            RestartPolicyName::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
            RestartPolicyName::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        };
        let options = UpdateContainerOptions {
            restart_policy: Some(bollard::models::RestartPolicy {
                name: Some(name_enum),
                maximum_retry_count: Some(maximum_retry_count as i64),
            }),
            ..Default::default()
        };
        self.docker
            .update_container(id, options)
            .await
            .map_err(|e| Self::map_err(id, e))?;
        Ok(())
    }

    async fn logs(
        &self,
        id: &str,
        tail: u32,
        since: chrono::DateTime<chrono::Utc>,
        max_bytes: usize,
    ) -> Result<LogsFetch, ContainerError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            since: since.timestamp(),
            timestamps: false,
            ..Default::default()
        };

        let mut stream = self.docker.logs(id, Some(options));
        let mut buf = Vec::new();
        let mut truncated = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Self::map_err(id, e))?;
            let bytes: &[u8] = match &chunk {
                LogOutput::StdOut { message } => message,
                LogOutput::StdErr { message } => message,
                LogOutput::StdIn { message } => message,
                LogOutput::Console { message } => message,
            };
            let remaining = max_bytes.saturating_sub(buf.len());
            if remaining == 0 {
                truncated = true;
                break;
            }
            if bytes.len() > remaining {
                buf.extend_from_slice(&bytes[..remaining]);
                truncated = true;
                break;
            }
            buf.extend_from_slice(bytes);
        }

        Ok(LogsFetch { content: buf, truncated })
    }

    fn has_docker(&self) -> bool {
        true
    }
}

/// Restart policy isn't part of the list-containers summary Docker returns,
/// so populating it costs one extra inspect call per container.
async fn restart_policy_of(docker: &Docker, id: &str) -> Option<RestartPolicy> {
    let info = docker.inspect_container(id, None).await.ok()?;
    let rp = info.host_config?.restart_policy?;
    let name = match rp.name? {
        RestartPolicyNameEnum::NO | RestartPolicyNameEnum::EMPTY => RestartPolicyName::No,
        RestartPolicyNameEnum::ALWAYS => RestartPolicyName::Always,
        RestartPolicyNameEnum::ON_FAILURE => RestartPolicyName::OnFailure,
        RestartPolicyNameEnum::UNLESS_STOPPED => RestartPolicyName::UnlessStopped,
    };
    Some(RestartPolicy {
        name,
        maximum_retry_count: rp.maximum_retry_count.unwrap_or(0).max(0) as u32,
    })
}
