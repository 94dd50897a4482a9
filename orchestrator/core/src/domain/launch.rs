// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Launch Domain Types
//!
//! What a single launch attempt works on:
//!
//! - [`QueuedTask`]: the build request waiting for an agent (owned by the
//!   build queue).
//! - [`LaunchTarget`] / [`SwarmAgentComputer`]: the agent slot the launcher
//!   is asked to bring up.
//! - [`LaunchContext`]: per-attempt state, including the shared
//!   [`AgentInfo`] record downstream agent tracking reads.
//! - [`LaunchListener`]: line-oriented output sink of the launch.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::naming::sanitize_job_name;

/// Build request waiting in the queue.
pub trait QueuedTask: Send + Sync {
    /// Job name used for derived identifiers (full path for nested jobs).
    fn job_name(&self) -> &str;

    fn assigned_label(&self) -> Option<&str>;

    fn supports_custom_workspace(&self) -> bool {
        false
    }

    fn set_custom_workspace(&self, _path: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Plain queued task description, as read from a launch request file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BuildableItem {
    pub job_name: String,

    #[serde(default)]
    pub label: Option<String>,

    /// Whether the job accepts a custom workspace location
    #[serde(default)]
    pub project: bool,

    #[serde(skip)]
    custom_workspace: Mutex<Option<String>>,
}

impl BuildableItem {
    pub fn new(job_name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            label: Some(label.into()),
            project: true,
            custom_workspace: Mutex::new(None),
        }
    }

    pub fn custom_workspace(&self) -> Option<String> {
        self.custom_workspace.lock().clone()
    }
}

impl QueuedTask for BuildableItem {
    fn job_name(&self) -> &str {
        &self.job_name
    }

    fn assigned_label(&self) -> Option<&str> {
        self.label.as_deref().filter(|l| !l.trim().is_empty())
    }

    fn supports_custom_workspace(&self) -> bool {
        self.project
    }

    fn set_custom_workspace(&self, path: &str) -> anyhow::Result<()> {
        *self.custom_workspace.lock() = Some(path.to_string());
        Ok(())
    }
}

/// Agent slot handed to a launcher.
pub trait LaunchTarget: Send + Sync {
    fn name(&self) -> &str;

    fn as_swarm_agent(&self) -> Option<&SwarmAgentComputer> {
        None
    }
}

/// Agent slot backed by a swarm service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmAgentComputer {
    /// Unique agent name, also the service name and dispatch key
    pub name: String,

    /// Controller-relative URL of the agent page, e.g. `computer/agent-1/`
    pub url: String,

    /// Secret the agent authenticates its inbound connection with
    pub secret: String,

    /// Stable agent identity used in cache volume names
    pub volume_name: String,
}

impl SwarmAgentComputer {
    pub fn new(
        name: impl Into<String>,
        secret: impl Into<String>,
        volume_name: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            url: format!("computer/{}/", name),
            name,
            secret: secret.into(),
            volume_name: volume_name.into(),
        }
    }

    /// Fresh agent identity with a random name suffix and secret.
    pub fn generate(prefix: &str) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let short = &id[..12];
        Self::new(
            format!("{}-{}", prefix, short),
            Uuid::new_v4().simple().to_string(),
            short,
        )
    }
}

impl LaunchTarget for SwarmAgentComputer {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_swarm_agent(&self) -> Option<&SwarmAgentComputer> {
        Some(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LaunchState {
    #[default]
    Pending,
    Provisioning,
    Dispatched,
    Failed { reason: String },
}

/// Facts recorded while an agent is being launched.
///
/// Written progressively so a launch that fails half-way still shows how
/// far it got.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub docker_image: Option<String>,
    pub limits_nano_cpus: i64,
    pub limits_memory_bytes: i64,
    pub reservations_nano_cpus: i64,
    pub reservations_memory_bytes: i64,
    pub cache_volume_name: Option<String>,
    /// Audit snapshot of the final create-service request
    pub service_request_json: Option<String>,
    pub state: LaunchState,
    pub updated_at: Option<DateTime<Utc>>,
}

impl AgentInfo {
    pub(crate) fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// One launch attempt.
#[derive(Clone)]
pub struct LaunchContext {
    task: Arc<dyn QueuedTask>,
    label: Option<String>,
    job_name: String,
    agent_info: Arc<Mutex<AgentInfo>>,
}

impl LaunchContext {
    pub fn new(task: Arc<dyn QueuedTask>) -> Self {
        let label = task.assigned_label().map(str::to_string);
        let job_name = task.job_name().to_string();
        Self {
            task,
            label,
            job_name,
            agent_info: Arc::new(Mutex::new(AgentInfo::default())),
        }
    }

    pub fn task(&self) -> &dyn QueuedTask {
        self.task.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn sanitized_job_name(&self) -> String {
        sanitize_job_name(&self.job_name)
    }

    /// Shared handle for agent tracking.
    pub fn agent_info(&self) -> Arc<Mutex<AgentInfo>> {
        Arc::clone(&self.agent_info)
    }

    pub fn snapshot(&self) -> AgentInfo {
        self.agent_info.lock().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut AgentInfo)) {
        let mut info = self.agent_info.lock();
        f(&mut info);
        info.touch();
    }
}

/// Output sink of a launch (the build log of the agent slot).
pub trait LaunchListener: Send + Sync {
    fn println(&self, line: &str);
}

/// Forwards launch output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl LaunchListener for TracingListener {
    fn println(&self, line: &str) {
        tracing::info!(target: "swarm_provisioner::launch", "{}", line);
    }
}

/// Keeps launch output in memory.
#[derive(Debug, Default)]
pub struct RecordingListener {
    lines: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl LaunchListener for RecordingListener {
    fn println(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_captures_task_identity() {
        let task = Arc::new(BuildableItem::new("team/api-build", "maven"));
        let ctx = LaunchContext::new(task);
        assert_eq!(ctx.label(), Some("maven"));
        assert_eq!(ctx.sanitized_job_name(), "team_api_build");
    }

    #[test]
    fn test_blank_label_is_unassigned() {
        let mut item = BuildableItem::new("job", "  ");
        assert_eq!(item.assigned_label(), None);
        item.label = None;
        assert_eq!(LaunchContext::new(Arc::new(item)).label(), None);
    }

    #[test]
    fn test_agent_info_is_shared() {
        let ctx = LaunchContext::new(Arc::new(BuildableItem::new("job", "x")));
        let tracked = ctx.agent_info();
        ctx.update(|info| info.docker_image = Some("img".to_string()));
        assert_eq!(tracked.lock().docker_image.as_deref(), Some("img"));
        assert!(tracked.lock().updated_at.is_some());
    }

    #[test]
    fn test_computer_url_derived_from_name() {
        let computer = SwarmAgentComputer::new("agent-42", "s3cr3t", "42");
        assert_eq!(computer.url, "computer/agent-42/");
        assert!(computer.as_swarm_agent().is_some());
    }

    #[test]
    fn test_generated_agents_are_distinct() {
        let a = SwarmAgentComputer::generate("swarm-agent");
        let b = SwarmAgentComputer::generate("swarm-agent");
        assert_ne!(a.name, b.name);
        assert!(a.name.starts_with("swarm-agent-"));
        assert_eq!(a.url, format!("computer/{}/", a.name));
        assert!(a.name.ends_with(&a.volume_name));
        assert_eq!(a.secret.len(), 32);
    }
}
