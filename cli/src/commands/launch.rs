// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

//! Agent launch commands
//!
//! Commands: render, launch
//!
//! Both read a launch request describing the queued task and, optionally,
//! the agent identity:
//!
//! ```yaml
//! task:
//!   job_name: team/api-build
//!   label: maven
//!   project: true
//! computer:            # optional, generated when absent
//!   name: agent-1
//!   secret: 0123abcd
//!   volume_name: "1"
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use swarm_provisioner_core::application::dispatcher::{ServiceDispatcher, SwarmDispatcher};
use swarm_provisioner_core::application::launcher::{AgentLauncher, ComputerLauncher, LaunchServices};
use swarm_provisioner_core::domain::cloud_config::{CloudConfiguration, SwarmCloudManifest};
use swarm_provisioner_core::domain::events::LaunchEvent;
use swarm_provisioner_core::domain::launch::{
    BuildableItem, LaunchContext, LaunchListener, SwarmAgentComputer, TracingListener,
};
use swarm_provisioner_core::domain::service_spec::ServiceSpecification;
use swarm_provisioner_core::domain::swarm::{DispatchError, ResourceDirectory};
use swarm_provisioner_core::infrastructure::docker_swarm::DockerSwarmClient;
use swarm_provisioner_core::infrastructure::event_bus::EventBus;
use swarm_provisioner_core::infrastructure::static_directory::StaticResourceDirectory;

#[derive(Args)]
pub struct RenderArgs {
    /// Launch request file
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,

    /// Resolve secrets and configs from a local file instead of the swarm
    #[arg(long)]
    pub offline: bool,

    /// Secret/config listing used with --offline
    #[arg(long, value_name = "FILE", requires = "offline")]
    pub resources: Option<PathBuf>,

    /// Name prefix for generated agents
    #[arg(long, default_value = "swarm-agent")]
    pub prefix: String,
}

#[derive(Args)]
pub struct LaunchArgs {
    /// Launch request file
    #[arg(value_name = "REQUEST")]
    pub request: PathBuf,

    /// Name prefix for generated agents
    #[arg(long, default_value = "swarm-agent")]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct LaunchRequest {
    pub task: BuildableItem,

    #[serde(default)]
    pub computer: Option<ComputerRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComputerRequest {
    pub name: String,
    pub secret: String,

    /// Defaults to the agent name
    #[serde(default)]
    pub volume_name: Option<String>,
}

impl LaunchRequest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read launch request {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid launch request {:?}", path))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Split into the queued task and the agent to launch for it.
    pub fn into_parts(self, prefix: &str) -> (Arc<BuildableItem>, SwarmAgentComputer) {
        let computer = match self.computer {
            Some(c) => {
                let volume_name = c.volume_name.unwrap_or_else(|| c.name.clone());
                SwarmAgentComputer::new(c.name, c.secret, volume_name)
            }
            None => SwarmAgentComputer::generate(prefix),
        };
        (Arc::new(self.task), computer)
    }
}

/// Accepts the finished request and drops it.
struct DryRunDispatcher;

impl ServiceDispatcher for DryRunDispatcher {
    fn dispatch(
        &self,
        key: String,
        spec: ServiceSpecification,
        _listener: Arc<dyn LaunchListener>,
    ) -> Result<(), DispatchError> {
        debug!(agent = %key, image = %spec.container().image, "Dry run, service not created");
        Ok(())
    }
}

fn load_manifest(config_path: Option<PathBuf>) -> Result<SwarmCloudManifest> {
    let manifest = SwarmCloudManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest.validate().context("Configuration validation failed")?;
    Ok(manifest)
}

fn load_resources(path: Option<&Path>) -> Result<StaticResourceDirectory> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read resource listing {:?}", path))?;
            serde_yaml::from_str(&content).with_context(|| format!("Invalid resource listing {:?}", path))
        }
        None => Ok(StaticResourceDirectory::new()),
    }
}

async fn connect(cloud: &CloudConfiguration) -> Result<DockerSwarmClient> {
    let client = DockerSwarmClient::connect(cloud.docker_socket_path.as_deref())?;
    client.healthcheck().await.context("Docker healthcheck failed")?;
    Ok(client)
}

/// Build the enriched request and print its JSON without creating a service.
pub async fn render(args: RenderArgs, config_path: Option<PathBuf>) -> Result<()> {
    let manifest = load_manifest(config_path)?;
    let (task, computer) = LaunchRequest::from_yaml_file(&args.request)?.into_parts(&args.prefix);

    let directory: Arc<dyn ResourceDirectory> = if args.offline {
        Arc::new(load_resources(args.resources.as_deref())?)
    } else {
        Arc::new(connect(&manifest.spec).await?)
    };

    let services = LaunchServices {
        cloud: Arc::new(manifest.spec),
        directory,
        dispatcher: Arc::new(DryRunDispatcher),
        events: EventBus::default(),
    };
    let launcher = AgentLauncher::new(services, LaunchContext::new(task));
    launcher
        .launch(&computer, Arc::new(TracingListener))
        .await
        .with_context(|| format!("Failed to render agent '{}'", computer.name))?;

    let request = launcher
        .context()
        .snapshot()
        .service_request_json
        .unwrap_or_default();
    println!("{}", request);
    Ok(())
}

/// Launch an agent and wait for its service creation to finish.
pub async fn launch(args: LaunchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let manifest = load_manifest(config_path)?;
    let (task, computer) = LaunchRequest::from_yaml_file(&args.request)?.into_parts(&args.prefix);

    let client = Arc::new(connect(&manifest.spec).await?);
    let events = EventBus::default();
    let mut receiver = events.subscribe();
    let (dispatcher, workers) = SwarmDispatcher::start(
        client.clone(),
        events.clone(),
        manifest.spec.dispatch_workers,
        manifest.spec.dispatch_queue_capacity,
    );

    let services = LaunchServices {
        cloud: Arc::new(manifest.spec),
        directory: client,
        dispatcher: Arc::new(dispatcher),
        events,
    };
    let launcher = AgentLauncher::new(services, LaunchContext::new(task));

    println!("Launching agent {}...", computer.name.bold());
    info!(agent = %computer.name, "Launching agent");
    let result = launcher.launch(&computer, Arc::new(TracingListener)).await;

    // Workers exit once the last dispatcher handle is gone
    drop(launcher);
    workers.join().await;

    let mut creation_failed = false;
    for event in receiver.drain() {
        creation_failed |= matches!(event, LaunchEvent::ServiceCreateFailed { .. });
        print_event(&event);
    }

    result.with_context(|| format!("Failed to launch agent '{}'", computer.name))?;
    if creation_failed {
        anyhow::bail!("Service creation for agent '{}' failed", computer.name);
    }
    Ok(())
}

fn print_event(event: &LaunchEvent) {
    match event {
        LaunchEvent::LaunchStarted { label, image, .. } => {
            println!("  {} label {} with image {}", "→".blue(), label, image);
        }
        LaunchEvent::ResourceNotFound { kind, name, .. } => {
            println!("  {} {} '{}' not found, skipped", "⚠".yellow(), kind, name);
        }
        LaunchEvent::CategoryAbandoned { kind, error, .. } => {
            println!("  {} no {}s attached: {}", "⚠".yellow(), kind, error);
        }
        LaunchEvent::ServiceDispatched { .. } => {
            println!("  {} service request dispatched", "→".blue());
        }
        LaunchEvent::LaunchFailed { reason, .. } => {
            println!("  {} {}", "✗".red(), reason);
        }
        LaunchEvent::ServiceCreated { service_id, .. } => {
            println!("{}", format!("✓ Service created: {}", service_id).green());
        }
        LaunchEvent::ServiceCreateFailed { error, .. } => {
            println!("{}", format!("✗ Service creation failed: {}", error).red());
        }
    }
}
