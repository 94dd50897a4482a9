// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Agent Launcher
//!
//! End-to-end launch of one build agent as a swarm service:
//!
//! ```text
//! queued task + label ─▶ template lookup ─▶ env assembly ─▶ platform command
//!     ─▶ service skeleton ─▶ enrichment ─▶ audit snapshot ─▶ dispatch
//! ```
//!
//! Everything up to and including enrichment runs on the caller's task.
//! Only the create-service call is handed to the [`ServiceDispatcher`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates a single launch attempt
//! - **Collaborators:** injected through [`LaunchServices`]

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::command::{AgentEndpoints, PlatformCommandBuilder};
use crate::application::dispatcher::ServiceDispatcher;
use crate::application::enricher::{EnrichmentScope, ServiceSpecEnricher};
use crate::application::resolver::NamedResourceResolver;
use crate::domain::cloud_config::CloudConfiguration;
use crate::domain::errors::LaunchError;
use crate::domain::events::LaunchEvent;
use crate::domain::launch::{LaunchContext, LaunchListener, LaunchState, LaunchTarget, SwarmAgentComputer};
use crate::domain::service_spec::{ServiceSkeleton, ServiceSpecBuilder, ServiceSpecification};
use crate::domain::swarm::ResourceDirectory;
use crate::domain::template::AgentTemplate;
use crate::infrastructure::event_bus::EventBus;

pub const AGENT_SECRET_ENV: &str = "DOCKER_SWARM_PLUGIN_JENKINS_AGENT_SECRET";
pub const AGENT_JAR_URL_ENV: &str = "DOCKER_SWARM_PLUGIN_JENKINS_AGENT_JAR_URL";
pub const AGENT_JNLP_URL_ENV: &str = "DOCKER_SWARM_PLUGIN_JENKINS_AGENT_JNLP_URL";

/// Something that can bring an agent slot online.
#[async_trait]
pub trait ComputerLauncher: Send + Sync {
    async fn launch(&self, target: &dyn LaunchTarget, listener: Arc<dyn LaunchListener>) -> Result<(), LaunchError>;
}

/// Process-wide collaborators shared by every launch.
#[derive(Clone)]
pub struct LaunchServices {
    pub cloud: Arc<CloudConfiguration>,
    pub directory: Arc<dyn ResourceDirectory>,
    pub dispatcher: Arc<dyn ServiceDispatcher>,
    pub events: EventBus,
}

/// Launcher bound to one queued task.
pub struct AgentLauncher {
    services: LaunchServices,
    context: LaunchContext,
}

impl AgentLauncher {
    pub fn new(services: LaunchServices, context: LaunchContext) -> Self {
        Self { services, context }
    }

    pub fn context(&self) -> &LaunchContext {
        &self.context
    }

    /// Produce the fully enriched specification for `computer` without
    /// dispatching it.
    ///
    /// Records the template facts on the agent info and publishes
    /// [`LaunchEvent::LaunchStarted`]. Directory listings are the only
    /// remote calls made.
    pub async fn prepare(
        &self,
        computer: &SwarmAgentComputer,
        listener: &dyn LaunchListener,
    ) -> Result<ServiceSpecification, LaunchError> {
        let cloud = &self.services.cloud;
        let label = self
            .context
            .label()
            .ok_or_else(|| LaunchError::MissingLabel(self.context.job_name().to_string()))?;
        let template = cloud
            .template_for_label(label)
            .ok_or_else(|| LaunchError::UnknownLabel(label.to_string()))?;

        self.record_template(template);
        self.services.events.publish(LaunchEvent::LaunchStarted {
            agent: computer.name.clone(),
            label: label.to_string(),
            image: template.image.clone(),
            started_at: Utc::now(),
        });
        info!(agent = %computer.name, label = %label, image = %template.image, "Launching agent");

        self.apply_custom_workspace(template)?;

        let endpoints = AgentEndpoints::new(cloud, computer);
        let env = assemble_environment(template, &endpoints);
        let agent_command = PlatformCommandBuilder::new(cloud).build(template, &endpoints)?;

        let builder = ServiceSpecBuilder::new(ServiceSkeleton {
            name: computer.name.clone(),
            image: agent_command.image,
            command: agent_command.command,
            env,
            dir: template.working_dir.clone(),
            user: template.user.clone(),
        });

        let enricher = ServiceSpecEnricher::new(
            NamedResourceResolver::new(Arc::clone(&self.services.directory), cloud.directory_timeout()),
            Arc::clone(cloud),
            self.services.events.clone(),
        );
        let scope = EnrichmentScope {
            context: &self.context,
            computer,
            listener,
        };
        enricher.enrich(builder, template, &scope).await
    }

    async fn launch_agent(
        &self,
        computer: &SwarmAgentComputer,
        listener: Arc<dyn LaunchListener>,
    ) -> Result<(), LaunchError> {
        let spec = self.prepare(computer, listener.as_ref()).await?;

        let snapshot = spec.to_json_string()?;
        self.context
            .update(|agent_info| agent_info.service_request_json = Some(snapshot));

        self.services
            .dispatcher
            .dispatch(computer.name.clone(), spec, Arc::clone(&listener))?;

        self.context.update(|agent_info| agent_info.state = LaunchState::Dispatched);
        self.services.events.publish(LaunchEvent::ServiceDispatched {
            agent: computer.name.clone(),
            dispatched_at: Utc::now(),
        });
        listener.println(&format!("Dispatched creation of service {}", computer.name));
        Ok(())
    }

    fn record_template(&self, template: &AgentTemplate) {
        self.context.update(|agent_info| {
            agent_info.docker_image = Some(template.image.clone());
            agent_info.limits_nano_cpus = template.limits_nano_cpus;
            agent_info.limits_memory_bytes = template.limits_memory_bytes;
            agent_info.reservations_nano_cpus = template.reservations_nano_cpus;
            agent_info.reservations_memory_bytes = template.reservations_memory_bytes;
            agent_info.state = LaunchState::Provisioning;
        });
    }

    fn apply_custom_workspace(&self, template: &AgentTemplate) -> Result<(), LaunchError> {
        let Some(location) = template.base_workspace_location() else {
            return Ok(());
        };
        let task = self.context.task();
        if !task.supports_custom_workspace() {
            return Ok(());
        }
        task.set_custom_workspace(location)
            .map_err(|e| LaunchError::Workspace {
                path: location.to_string(),
                reason: e.to_string(),
            })
    }

    fn record_failure(&self, agent: &str, err: &LaunchError) {
        if err.is_configuration_error() {
            error!(agent = %agent, error = %err, "Agent launch rejected");
        } else {
            warn!(agent = %agent, error = %err, "Failed to launch agent");
        }
        let outcome = if err.is_configuration_error() { "rejected" } else { "failed" };
        metrics::counter!("swarm_provisioner_launches_total", "outcome" => outcome).increment(1);

        let reason = err.to_string();
        self.context.update(|agent_info| {
            agent_info.state = LaunchState::Failed {
                reason: reason.clone(),
            }
        });
        self.services.events.publish(LaunchEvent::LaunchFailed {
            agent: agent.to_string(),
            reason,
            failed_at: Utc::now(),
        });
    }
}

#[async_trait]
impl ComputerLauncher for AgentLauncher {
    async fn launch(&self, target: &dyn LaunchTarget, listener: Arc<dyn LaunchListener>) -> Result<(), LaunchError> {
        let Some(computer) = target.as_swarm_agent() else {
            return Err(LaunchError::IncompatibleTarget(target.name().to_string()));
        };

        match self.launch_agent(computer, listener).await {
            Ok(()) => {
                metrics::counter!("swarm_provisioner_launches_total", "outcome" => "dispatched").increment(1);
                Ok(())
            }
            Err(e) => {
                self.record_failure(&computer.name, &e);
                Err(e)
            }
        }
    }
}

/// Template variables (order preserved) followed by the three agent
/// connection variables.
pub fn assemble_environment(template: &AgentTemplate, endpoints: &AgentEndpoints) -> Vec<String> {
    let mut env = Vec::with_capacity(template.env_vars.len() + 3);
    env.extend(template.env_vars.iter().cloned());
    env.push(format!("{}={}", AGENT_SECRET_ENV, endpoints.secret));
    env.push(format!("{}={}", AGENT_JAR_URL_ENV, endpoints.jar_url));
    env.push(format!("{}={}", AGENT_JNLP_URL_ENV, endpoints.jnlp_url));
    env
}
