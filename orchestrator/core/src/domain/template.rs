// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Templates
//!
//! Per-label description of the container a build agent runs in: image,
//! resources, mounts, attached secrets/configs and bootstrap command.
//! Templates are authored by operators inside the cloud configuration and
//! are read-only for the launcher.

use serde::{Deserialize, Serialize};

/// Label marker selecting the privileged nested-container mode.
pub const DIND_LABEL: &str = "dind";

/// Operating system family of the agent container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Linux,
    Windows,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTemplate {
    /// Whitespace-separated list of labels this template serves
    pub label: String,

    /// Container image the agent runs in
    pub image: String,

    /// Bootstrap command (ignored on Windows)
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    #[serde(default)]
    pub platform: Platform,

    /// `KEY=VALUE` entries, injected before the synthesized agent variables
    #[serde(default)]
    pub env_vars: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    // Resource limits/reservations (0 = unset)
    #[serde(default)]
    pub limits_nano_cpus: i64,
    #[serde(default)]
    pub limits_memory_bytes: i64,
    #[serde(default)]
    pub reservations_nano_cpus: i64,
    #[serde(default)]
    pub reservations_memory_bytes: i64,

    /// `source:target` host bind mounts
    #[serde(default)]
    pub host_binds: Vec<String>,

    /// Directories backed by the per-job cache volume
    #[serde(default)]
    pub cache_dirs: Vec<String>,

    /// `name:mountPath` secret references
    #[serde(default)]
    pub secrets: Vec<String>,

    /// `name:mountPath` config references
    #[serde(default)]
    pub configs: Vec<String>,

    #[serde(default)]
    pub tmpfs_dir: Option<String>,

    #[serde(default)]
    pub placement_constraints: Vec<String>,

    /// Custom workspace applied to tasks that support one
    #[serde(default)]
    pub base_workspace_location: Option<String>,
}

impl AgentTemplate {
    /// Minimal Linux template, mostly useful for tests and generated samples.
    pub fn new(label: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            image: image.into(),
            command: default_command(),
            platform: Platform::Linux,
            env_vars: vec![],
            working_dir: None,
            user: None,
            limits_nano_cpus: 0,
            limits_memory_bytes: 0,
            reservations_nano_cpus: 0,
            reservations_memory_bytes: 0,
            host_binds: vec![],
            cache_dirs: vec![],
            secrets: vec![],
            configs: vec![],
            tmpfs_dir: None,
            placement_constraints: vec![],
            base_workspace_location: None,
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.label.split_whitespace()
    }

    pub fn serves_label(&self, label: &str) -> bool {
        self.labels().any(|l| l == label)
    }

    pub fn is_dind(&self) -> bool {
        self.label.contains(DIND_LABEL)
    }

    pub fn is_windows(&self) -> bool {
        self.platform == Platform::Windows
    }

    pub fn tmpfs_dir(&self) -> Option<&str> {
        self.tmpfs_dir.as_deref().filter(|d| !d.trim().is_empty())
    }

    pub fn base_workspace_location(&self) -> Option<&str> {
        self.base_workspace_location
            .as_deref()
            .filter(|d| !d.trim().is_empty())
    }
}

/// Fetches the agent jar and connects back to the controller using the
/// three synthesized environment variables.
pub fn default_command() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-cx".to_string(),
        "curl --connect-timeout 20 --max-time 60 -o agent.jar $DOCKER_SWARM_PLUGIN_JENKINS_AGENT_JAR_URL \
         && java -jar agent.jar -jnlpUrl $DOCKER_SWARM_PLUGIN_JENKINS_AGENT_JNLP_URL \
         -secret $DOCKER_SWARM_PLUGIN_JENKINS_AGENT_SECRET -noReconnect -workDir /tmp"
            .to_string(),
    ]
}
