// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use bollard::models::{Config, Secret, ServiceSpec};
use bollard::query_parameters::{ListConfigsOptions, ListSecretsOptions};
use bollard::Docker;
use tracing::{debug, info};

use crate::domain::resource::{NamedResource, ResourceKind};
use crate::domain::service_spec::ServiceSpecification;
use crate::domain::swarm::{DirectoryError, ResourceDirectory, ServiceId, ServiceOrchestrator};

/// Swarm manager client backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerSwarmClient {
    docker: Docker,
}

impl DockerSwarmClient {
    /// Connect to a custom socket, or auto-detect the local daemon.
    pub fn connect(socket_path: Option<&str>) -> Result<Self, DirectoryError> {
        let docker = if let Some(path) = socket_path {
            #[cfg(unix)]
            let result = Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION);

            #[cfg(windows)]
            let result = Docker::connect_with_named_pipe(path, 120, bollard::API_DEFAULT_VERSION);

            result.map_err(|e| {
                DirectoryError::Transport(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults().map_err(|e| {
                DirectoryError::Transport(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Common causes:\n\
                     - Docker daemon not running (check: docker ps)\n\
                     - Permission denied accessing Docker socket\n\
                     - This node is not a swarm manager (check: docker node ls)",
                    e
                ))
            })?
        };

        Ok(Self { docker })
    }

    /// Verify the Docker daemon is reachable.
    pub async fn healthcheck(&self) -> Result<(), DirectoryError> {
        self.docker.ping().await.map_err(map_bollard_error)?;
        Ok(())
    }
}

/// Distinguish API answers from transport and decoding failures.
pub fn map_bollard_error(e: bollard::errors::Error) -> DirectoryError {
    match e {
        bollard::errors::Error::DockerResponseServerError { status_code, message } => DirectoryError::Api {
            status: status_code,
            message,
        },
        bollard::errors::Error::JsonDataError { message, .. } => DirectoryError::Serialization(message),
        bollard::errors::Error::JsonSerdeError { err } => DirectoryError::Serialization(err.to_string()),
        other => DirectoryError::Transport(other.to_string()),
    }
}

/// Build the bollard request from the domain specification.
///
/// Goes through JSON so the request body and the audit snapshot are the
/// same document.
pub fn to_bollard_spec(spec: &ServiceSpecification) -> Result<ServiceSpec, DirectoryError> {
    let value = serde_json::to_value(spec).map_err(|e| DirectoryError::Serialization(e.to_string()))?;
    serde_json::from_value(value).map_err(|e| DirectoryError::Serialization(e.to_string()))
}

fn secret_entry(secret: Secret) -> Option<NamedResource> {
    let name = secret.spec.and_then(|s| s.name)?;
    Some(NamedResource::new(ResourceKind::Secret, secret.id?, name))
}

fn config_entry(config: Config) -> Option<NamedResource> {
    let name = config.spec.and_then(|s| s.name)?;
    Some(NamedResource::new(ResourceKind::Config, config.id?, name))
}

#[async_trait]
impl ResourceDirectory for DockerSwarmClient {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<NamedResource>, DirectoryError> {
        let entries: Vec<NamedResource> = match kind {
            ResourceKind::Secret => self
                .docker
                .list_secrets(None::<ListSecretsOptions>)
                .await
                .map_err(map_bollard_error)?
                .into_iter()
                .filter_map(secret_entry)
                .collect(),
            ResourceKind::Config => self
                .docker
                .list_configs(None::<ListConfigsOptions>)
                .await
                .map_err(map_bollard_error)?
                .into_iter()
                .filter_map(config_entry)
                .collect(),
        };
        debug!(kind = %kind, count = entries.len(), "Listed swarm {}s", kind);
        Ok(entries)
    }
}

#[async_trait]
impl ServiceOrchestrator for DockerSwarmClient {
    async fn create_service(&self, spec: &ServiceSpecification) -> Result<ServiceId, DirectoryError> {
        let request = to_bollard_spec(spec)?;
        let response = self
            .docker
            .create_service(request, None)
            .await
            .map_err(map_bollard_error)?;

        let id = response.id.ok_or_else(|| {
            DirectoryError::Serialization(format!("create-service response for '{}' carries no ID", spec.name))
        })?;
        info!(service = %spec.name, service_id = %id, "Swarm service created");
        Ok(ServiceId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service_spec::{ServiceSkeleton, ServiceSpecBuilder};

    #[test]
    fn test_domain_spec_converts_to_bollard() {
        let spec = ServiceSpecBuilder::new(ServiceSkeleton {
            name: "agent-1".to_string(),
            image: "builder:1".to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), "build.sh".to_string()],
            env: vec!["A=1".to_string()],
            dir: Some("/work".to_string()),
            user: None,
        })
        .with_bind_mount("/a", "/b")
        .with_secret("abc123", "db-cred", "/run/secrets/db")
        .with_network("ci-agents")
        .with_label("ROLE", "jenkins-agent")
        .with_restart_attempts(0)
        .build();

        let converted = to_bollard_spec(&spec).unwrap();
        assert_eq!(converted.name.as_deref(), Some("agent-1"));
        let task = converted.task_template.unwrap();
        let container = task.container_spec.unwrap();
        assert_eq!(container.image.as_deref(), Some("builder:1"));
        assert_eq!(container.dir.as_deref(), Some("/work"));
        assert_eq!(container.mounts.unwrap().len(), 1);
        let secret = &container.secrets.unwrap()[0];
        assert_eq!(secret.secret_id.as_deref(), Some("abc123"));
        assert_eq!(secret.file.as_ref().and_then(|f| f.mode), Some(0o444));
        assert_eq!(task.restart_policy.unwrap().max_attempts, Some(0));
        assert_eq!(
            converted.labels.unwrap().get("ROLE").map(String::as_str),
            Some("jenkins-agent")
        );
    }

    #[test]
    fn test_server_errors_keep_status() {
        let err = map_bollard_error(bollard::errors::Error::DockerResponseServerError {
            status_code: 503,
            message: "This node is not a swarm manager.".to_string(),
        });
        assert!(matches!(err, DirectoryError::Api { status: 503, .. }));
    }
}
