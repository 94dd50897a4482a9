// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Service Specification
//!
//! Request body for the swarm "create service" call, modelled with the
//! Docker Engine field names so the JSON audit snapshot recorded on the agent
//! info is byte-for-byte the document sent to the swarm manager.
//!
//! Specifications are only produced by [`ServiceSpecBuilder`]: every
//! enrichment step consumes the builder and returns a new one, and
//! [`ServiceSpecBuilder::build`] yields the finished value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpecification {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Labels", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(rename = "TaskTemplate")]
    pub task_template: TaskTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    #[serde(rename = "ContainerSpec")]
    pub container_spec: ContainerSpec,

    #[serde(rename = "Resources", default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,

    #[serde(rename = "RestartPolicy", default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,

    #[serde(rename = "Placement", default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,

    #[serde(rename = "Networks", default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkAttachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(rename = "Image")]
    pub image: String,

    #[serde(rename = "Command", default)]
    pub command: Vec<String>,

    #[serde(rename = "Env", default)]
    pub env: Vec<String>,

    #[serde(rename = "Dir", default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(rename = "User", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(rename = "Mounts", default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<Mount>,

    #[serde(rename = "Secrets", default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<SecretAttachment>,

    #[serde(rename = "Configs", default, skip_serializing_if = "Vec::is_empty")]
    pub configs: Vec<ConfigAttachment>,
}

/// CPU is expressed in billionths of a CPU, memory in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceValues {
    #[serde(rename = "NanoCPUs", default, skip_serializing_if = "Option::is_none")]
    pub nano_cpus: Option<i64>,

    #[serde(rename = "MemoryBytes", default, skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<i64>,
}

impl ResourceValues {
    /// Zero means "unset" in agent templates.
    pub fn from_template(nano_cpus: i64, memory_bytes: i64) -> Option<Self> {
        let values = Self {
            nano_cpus: (nano_cpus > 0).then_some(nano_cpus),
            memory_bytes: (memory_bytes > 0).then_some(memory_bytes),
        };
        if values.nano_cpus.is_none() && values.memory_bytes.is_none() {
            None
        } else {
            Some(values)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    #[serde(rename = "Limits", default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceValues>,

    #[serde(rename = "Reservations", default, skip_serializing_if = "Option::is_none")]
    pub reservations: Option<ResourceValues>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Bind,
    Volume,
    Tmpfs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    #[serde(rename = "Type")]
    pub mount_type: MountType,

    #[serde(rename = "Source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(rename = "Target")]
    pub target: String,

    #[serde(rename = "VolumeOptions", default, skip_serializing_if = "Option::is_none")]
    pub volume_options: Option<VolumeOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOptions {
    #[serde(rename = "DriverConfig", default, skip_serializing_if = "Option::is_none")]
    pub driver_config: Option<DriverConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(rename = "Name")]
    pub name: String,
}

/// File the swarm materialises inside the container for a secret or config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentFile {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(rename = "GID")]
    pub gid: String,
    #[serde(rename = "Mode")]
    pub mode: u32,
}

impl AttachmentFile {
    /// Root-owned, world-readable file at `path`.
    pub fn read_only(path: impl Into<String>) -> Self {
        Self {
            name: path.into(),
            uid: "0".to_string(),
            gid: "0".to_string(),
            mode: 0o444,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretAttachment {
    #[serde(rename = "SecretID")]
    pub secret_id: String,
    #[serde(rename = "SecretName")]
    pub secret_name: String,
    #[serde(rename = "File")]
    pub file: AttachmentFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigAttachment {
    #[serde(rename = "ConfigID")]
    pub config_id: String,
    #[serde(rename = "ConfigName")]
    pub config_name: String,
    #[serde(rename = "File")]
    pub file: AttachmentFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAttachment {
    #[serde(rename = "Target")]
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    #[serde(rename = "Constraints", default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    #[serde(rename = "Condition")]
    pub condition: String,
    #[serde(rename = "MaxAttempts")]
    pub max_attempts: i64,
}

impl ServiceSpecification {
    pub fn container(&self) -> &ContainerSpec {
        &self.task_template.container_spec
    }

    pub fn mounts_of(&self, mount_type: MountType) -> impl Iterator<Item = &Mount> {
        self.container()
            .mounts
            .iter()
            .filter(move |m| m.mount_type == mount_type)
    }

    pub fn restart_attempts(&self) -> Option<i64> {
        self.task_template.restart_policy.as_ref().map(|p| p.max_attempts)
    }

    /// Pretty-printed JSON rendition used as the audit snapshot.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Skeleton fields every service starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSkeleton {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<String>,
    pub dir: Option<String>,
    pub user: Option<String>,
}

/// Accumulates enrichment deltas on top of a skeleton.
#[derive(Debug, Clone)]
#[must_use]
pub struct ServiceSpecBuilder {
    spec: ServiceSpecification,
}

impl ServiceSpecBuilder {
    pub fn new(skeleton: ServiceSkeleton) -> Self {
        let blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            spec: ServiceSpecification {
                name: skeleton.name,
                labels: BTreeMap::new(),
                task_template: TaskTemplate {
                    container_spec: ContainerSpec {
                        image: skeleton.image,
                        command: skeleton.command,
                        env: skeleton.env,
                        dir: blank(skeleton.dir),
                        user: blank(skeleton.user),
                        mounts: Vec::new(),
                        secrets: Vec::new(),
                        configs: Vec::new(),
                    },
                    resources: None,
                    restart_policy: None,
                    placement: None,
                    networks: Vec::new(),
                },
            },
        }
    }

    pub fn with_resources(mut self, limits: Option<ResourceValues>, reservations: Option<ResourceValues>) -> Self {
        self.spec.task_template.resources = if limits.is_none() && reservations.is_none() {
            None
        } else {
            Some(Resources { limits, reservations })
        };
        self
    }

    pub fn with_bind_mount(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.spec.task_template.container_spec.mounts.push(Mount {
            mount_type: MountType::Bind,
            source: Some(source.into()),
            target: target.into(),
            volume_options: None,
        });
        self
    }

    pub fn with_secret(mut self, id: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.spec.task_template.container_spec.secrets.push(SecretAttachment {
            secret_id: id.into(),
            secret_name: name.into(),
            file: AttachmentFile::read_only(path),
        });
        self
    }

    pub fn with_config(mut self, id: impl Into<String>, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.spec.task_template.container_spec.configs.push(ConfigAttachment {
            config_id: id.into(),
            config_name: name.into(),
            file: AttachmentFile::read_only(path),
        });
        self
    }

    /// An empty network name leaves the service on the default network.
    pub fn with_network(mut self, network: &str) -> Self {
        if !network.trim().is_empty() {
            self.spec.task_template.networks.push(NetworkAttachment {
                target: network.trim().to_string(),
            });
        }
        self
    }

    pub fn with_cache_volume(mut self, volume: impl Into<String>, target: impl Into<String>, driver: &str) -> Self {
        let volume_options = (!driver.trim().is_empty()).then(|| VolumeOptions {
            driver_config: Some(DriverConfig {
                name: driver.trim().to_string(),
            }),
        });
        self.spec.task_template.container_spec.mounts.push(Mount {
            mount_type: MountType::Volume,
            source: Some(volume.into()),
            target: target.into(),
            volume_options,
        });
        self
    }

    pub fn with_tmpfs(mut self, target: impl Into<String>) -> Self {
        self.spec.task_template.container_spec.mounts.push(Mount {
            mount_type: MountType::Tmpfs,
            source: None,
            target: target.into(),
            volume_options: None,
        });
        self
    }

    pub fn with_placement_constraints(mut self, constraints: Vec<String>) -> Self {
        self.spec.task_template.placement = Some(Placement { constraints });
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.labels.insert(key.into(), value.into());
        self
    }

    /// Condition `none` keeps the orchestrator from rescheduling a failed agent.
    pub fn with_restart_attempts(mut self, max_attempts: i64) -> Self {
        self.spec.task_template.restart_policy = Some(RestartPolicy {
            condition: "none".to_string(),
            max_attempts,
        });
        self
    }

    pub fn build(self) -> ServiceSpecification {
        self.spec
    }
}
