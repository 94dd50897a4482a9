// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Service Spec Enricher
//!
//! Turns a skeleton service into the full create-service request for one
//! agent. Steps run strictly in this order, which is also the order they
//! appear in the audit snapshot:
//!
//! 1. resource limits and reservations
//! 2. host bind mounts
//! 3. secrets
//! 4. configs
//! 5. network attachment
//! 6. per-job cache volumes
//! 7. tmpfs mount
//! 8. placement constraints
//! 9. build-agent role label
//! 10. restart policy
//!
//! Every template reference is parsed before the first directory call, so a
//! malformed template never reaches the swarm. Directory trouble only costs
//! the affected attachments.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Ordered, partially failure-tolerant service enrichment

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::resolver::{NamedResourceResolver, Resolution};
use crate::domain::cloud_config::CloudConfiguration;
use crate::domain::errors::LaunchError;
use crate::domain::events::LaunchEvent;
use crate::domain::launch::{LaunchContext, LaunchListener, SwarmAgentComputer};
use crate::domain::naming::cache_volume_name;
use crate::domain::resource::{HostBind, ResourceKind, ResourceReference};
use crate::domain::service_spec::{ResourceValues, ServiceSpecBuilder, ServiceSpecification};
use crate::domain::template::AgentTemplate;
use crate::infrastructure::event_bus::EventBus;

pub const ROLE_LABEL_KEY: &str = "ROLE";
pub const ROLE_LABEL_VALUE: &str = "jenkins-agent";

/// Agents are never rescheduled by the swarm.
pub const AGENT_RESTART_ATTEMPTS: i64 = 0;

/// Per-launch inputs the enrichment steps read or record into.
pub struct EnrichmentScope<'a> {
    pub context: &'a LaunchContext,
    pub computer: &'a SwarmAgentComputer,
    pub listener: &'a dyn LaunchListener,
}

/// Template entries parsed up front.
struct ParsedTemplate {
    binds: Vec<HostBind>,
    secrets: Vec<ResourceReference>,
    configs: Vec<ResourceReference>,
}

impl ParsedTemplate {
    fn parse(template: &AgentTemplate) -> Result<Self, LaunchError> {
        let references = |kind: ResourceKind, entries: &[String]| {
            entries
                .iter()
                .map(|entry| ResourceReference::parse(kind, entry))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            binds: template
                .host_binds
                .iter()
                .map(|entry| HostBind::parse(entry))
                .collect::<Result<_, _>>()?,
            secrets: references(ResourceKind::Secret, &template.secrets)?,
            configs: references(ResourceKind::Config, &template.configs)?,
        })
    }
}

pub struct ServiceSpecEnricher {
    resolver: NamedResourceResolver,
    cloud: Arc<CloudConfiguration>,
    events: EventBus,
}

impl ServiceSpecEnricher {
    pub fn new(resolver: NamedResourceResolver, cloud: Arc<CloudConfiguration>, events: EventBus) -> Self {
        Self {
            resolver,
            cloud,
            events,
        }
    }

    pub async fn enrich(
        &self,
        builder: ServiceSpecBuilder,
        template: &AgentTemplate,
        scope: &EnrichmentScope<'_>,
    ) -> Result<ServiceSpecification, LaunchError> {
        let parsed = ParsedTemplate::parse(template)?;

        let builder = apply_resources(builder, template);
        let builder = apply_host_binds(builder, &parsed.binds);
        let builder = self
            .attach_resources(builder, ResourceKind::Secret, &parsed.secrets, scope)
            .await;
        let builder = self
            .attach_resources(builder, ResourceKind::Config, &parsed.configs, scope)
            .await;
        let builder = apply_network(builder, &self.cloud);
        let builder = apply_cache_volumes(builder, template, &self.cloud, scope);
        let builder = apply_tmpfs(builder, template);
        let builder = apply_placement_constraints(builder, template);
        let builder = apply_role_label(builder);
        let builder = apply_restart_policy(builder);

        Ok(builder.build())
    }

    /// Steps 3 and 4: one listing per kind, then exact-name matching.
    async fn attach_resources(
        &self,
        builder: ServiceSpecBuilder,
        kind: ResourceKind,
        references: &[ResourceReference],
        scope: &EnrichmentScope<'_>,
    ) -> ServiceSpecBuilder {
        if references.is_empty() {
            return builder;
        }
        let agent = scope.computer.name.as_str();

        let catalog = match self.resolver.catalog(kind).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(agent = %agent, kind = %kind, error = %e, "Failed setting {}s, skipping all of them", kind);
                scope
                    .listener
                    .println(&format!("Could not list {}s, none will be attached: {}", kind, e));
                self.events.publish(LaunchEvent::CategoryAbandoned {
                    agent: agent.to_string(),
                    kind,
                    error: e.to_string(),
                    reported_at: Utc::now(),
                });
                return builder;
            }
        };

        references.iter().fold(builder, |builder, reference| {
            match catalog.resolve(&reference.name) {
                Resolution::Found(id) => match kind {
                    ResourceKind::Secret => {
                        builder.with_secret(id, reference.name.clone(), reference.mount_path.clone())
                    }
                    ResourceKind::Config => {
                        builder.with_config(id, reference.name.clone(), reference.mount_path.clone())
                    }
                },
                Resolution::NotFound => {
                    warn!(agent = %agent, kind = %kind, name = %reference.name, "{} {} not found", kind, reference.name);
                    metrics::counter!("swarm_provisioner_resources_unresolved_total", "kind" => kind.as_str())
                        .increment(1);
                    self.events.publish(LaunchEvent::ResourceNotFound {
                        agent: agent.to_string(),
                        kind,
                        name: reference.name.clone(),
                        reported_at: Utc::now(),
                    });
                    builder
                }
            }
        })
    }
}

pub fn apply_resources(builder: ServiceSpecBuilder, template: &AgentTemplate) -> ServiceSpecBuilder {
    builder.with_resources(
        ResourceValues::from_template(template.limits_nano_cpus, template.limits_memory_bytes),
        ResourceValues::from_template(template.reservations_nano_cpus, template.reservations_memory_bytes),
    )
}

pub fn apply_host_binds(builder: ServiceSpecBuilder, binds: &[HostBind]) -> ServiceSpecBuilder {
    binds.iter().fold(builder, |builder, bind| {
        builder.with_bind_mount(bind.source.clone(), bind.target.clone())
    })
}

pub fn apply_network(builder: ServiceSpecBuilder, cloud: &CloudConfiguration) -> ServiceSpecBuilder {
    builder.with_network(&cloud.swarm_network)
}

/// Step 6. Records the volume name on the agent info so tracking can find
/// (and eventually prune) it.
pub fn apply_cache_volumes(
    builder: ServiceSpecBuilder,
    template: &AgentTemplate,
    cloud: &CloudConfiguration,
    scope: &EnrichmentScope<'_>,
) -> ServiceSpecBuilder {
    if template.cache_dirs.is_empty() {
        return builder;
    }

    let volume = cache_volume_name(scope.context.job_name(), &scope.computer.volume_name);
    scope
        .context
        .update(|agent_info| agent_info.cache_volume_name = Some(volume.clone()));

    template.cache_dirs.iter().fold(builder, |builder, dir| {
        info!(agent = %scope.computer.name, volume = %volume, target = %dir, "Binding cache volume");
        scope
            .listener
            .println(&format!("Binding Volume {} to {}", dir, volume));
        builder.with_cache_volume(volume.clone(), dir.clone(), &cloud.cache_driver_name)
    })
}

pub fn apply_tmpfs(builder: ServiceSpecBuilder, template: &AgentTemplate) -> ServiceSpecBuilder {
    match template.tmpfs_dir() {
        Some(dir) => builder.with_tmpfs(dir),
        None => builder,
    }
}

pub fn apply_placement_constraints(builder: ServiceSpecBuilder, template: &AgentTemplate) -> ServiceSpecBuilder {
    builder.with_placement_constraints(template.placement_constraints.clone())
}

pub fn apply_role_label(builder: ServiceSpecBuilder) -> ServiceSpecBuilder {
    builder.with_label(ROLE_LABEL_KEY, ROLE_LABEL_VALUE)
}

pub fn apply_restart_policy(builder: ServiceSpecBuilder) -> ServiceSpecBuilder {
    builder.with_restart_attempts(AGENT_RESTART_ATTEMPTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::launch::{BuildableItem, RecordingListener};
    use crate::domain::resource::NamedResource;
    use crate::domain::service_spec::{MountType, ServiceSkeleton};
    use crate::domain::swarm::{DirectoryError, ResourceDirectory};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Secrets listing succeeds, configs listing fails; counts calls.
    struct SplitDirectory {
        secrets: Vec<NamedResource>,
        calls: Mutex<Vec<ResourceKind>>,
    }

    #[async_trait]
    impl ResourceDirectory for SplitDirectory {
        async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<NamedResource>, DirectoryError> {
            self.calls.lock().push(kind);
            match kind {
                ResourceKind::Secret => Ok(self.secrets.clone()),
                ResourceKind::Config => Err(DirectoryError::Transport("connection reset".to_string())),
            }
        }
    }

    fn skeleton() -> ServiceSpecBuilder {
        ServiceSpecBuilder::new(ServiceSkeleton {
            name: "agent-1".to_string(),
            image: "builder:1".to_string(),
            command: vec![],
            env: vec![],
            dir: None,
            user: None,
        })
    }

    fn enricher(directory: Arc<SplitDirectory>, cloud: CloudConfiguration, events: EventBus) -> ServiceSpecEnricher {
        ServiceSpecEnricher::new(
            NamedResourceResolver::new(directory, Duration::from_secs(5)),
            Arc::new(cloud),
            events,
        )
    }

    fn directory(secrets: Vec<NamedResource>) -> Arc<SplitDirectory> {
        Arc::new(SplitDirectory {
            secrets,
            calls: Mutex::new(vec![]),
        })
    }

    #[tokio::test]
    async fn test_two_host_binds_scenario() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.host_binds = vec!["/a:/b".to_string(), "/c:/d".to_string()];
        let ctx = LaunchContext::new(Arc::new(BuildableItem::new("job", "build")));
        let computer = SwarmAgentComputer::new("agent-1", "s", "1");
        let listener = RecordingListener::new();
        let scope = EnrichmentScope { context: &ctx, computer: &computer, listener: &listener };
        let dir = directory(vec![]);

        let spec = enricher(dir.clone(), CloudConfiguration::new("http://ci"), EventBus::default())
            .enrich(skeleton(), &template, &scope)
            .await
            .unwrap();

        let targets: Vec<&str> = spec.mounts_of(MountType::Bind).map(|m| m.target.as_str()).collect();
        assert_eq!(targets, vec!["/b", "/d"]);
        assert_eq!(spec.mounts_of(MountType::Volume).count(), 0);
        assert_eq!(spec.restart_attempts(), Some(0));
        assert_eq!(spec.labels.get(ROLE_LABEL_KEY).map(String::as_str), Some(ROLE_LABEL_VALUE));
        assert!(dir.calls.lock().is_empty(), "no references, no listings");
    }

    #[tokio::test]
    async fn test_config_listing_failure_only_drops_configs() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.secrets = vec!["db-cred:/run/secrets/db".to_string()];
        template.configs = vec!["settings:/etc/settings.xml".to_string()];
        template.tmpfs_dir = Some("/tmp/work".to_string());
        let ctx = LaunchContext::new(Arc::new(BuildableItem::new("job", "build")));
        let computer = SwarmAgentComputer::new("agent-1", "s", "1");
        let listener = RecordingListener::new();
        let scope = EnrichmentScope { context: &ctx, computer: &computer, listener: &listener };
        let events = EventBus::default();
        let mut receiver = events.subscribe();
        let dir = directory(vec![NamedResource::new(ResourceKind::Secret, "abc123", "db-cred")]);

        let spec = enricher(dir.clone(), CloudConfiguration::new("http://ci"), events)
            .enrich(skeleton(), &template, &scope)
            .await
            .unwrap();

        assert_eq!(spec.container().secrets.len(), 1);
        assert!(spec.container().configs.is_empty());
        assert_eq!(spec.mounts_of(MountType::Tmpfs).count(), 1);
        assert_eq!(*dir.calls.lock(), vec![ResourceKind::Secret, ResourceKind::Config]);

        let events = receiver.drain();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            LaunchEvent::CategoryAbandoned { kind: ResourceKind::Config, .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_reference_fails_before_any_listing() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.secrets = vec!["db-cred:/run/secrets/db".to_string()];
        template.configs = vec!["no-separator".to_string()];
        let ctx = LaunchContext::new(Arc::new(BuildableItem::new("job", "build")));
        let computer = SwarmAgentComputer::new("agent-1", "s", "1");
        let listener = RecordingListener::new();
        let scope = EnrichmentScope { context: &ctx, computer: &computer, listener: &listener };
        let dir = directory(vec![]);

        let err = enricher(dir.clone(), CloudConfiguration::new("http://ci"), EventBus::default())
            .enrich(skeleton(), &template, &scope)
            .await
            .unwrap_err();

        assert!(err.is_configuration_error());
        assert!(dir.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_host_bind_is_configuration_error() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.host_binds = vec!["/only-source".to_string()];
        let ctx = LaunchContext::new(Arc::new(BuildableItem::new("job", "build")));
        let computer = SwarmAgentComputer::new("agent-1", "s", "1");
        let listener = RecordingListener::new();
        let scope = EnrichmentScope { context: &ctx, computer: &computer, listener: &listener };

        let err = enricher(directory(vec![]), CloudConfiguration::new("http://ci"), EventBus::default())
            .enrich(skeleton(), &template, &scope)
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::MalformedHostBind(ref entry) if entry == "/only-source"));
    }

    #[test]
    fn test_cache_volumes_are_recorded_and_bound() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.cache_dirs = vec!["/root/.m2".to_string(), "/root/.gradle".to_string()];
        let mut cloud = CloudConfiguration::new("http://ci");
        cloud.cache_driver_name = "rexray".to_string();
        let ctx = LaunchContext::new(Arc::new(BuildableItem::new("team/api-build", "build")));
        let computer = SwarmAgentComputer::new("agent-7", "s", "7");
        let listener = RecordingListener::new();
        let scope = EnrichmentScope { context: &ctx, computer: &computer, listener: &listener };

        let spec = apply_cache_volumes(skeleton(), &template, &cloud, &scope).build();

        let volumes: Vec<_> = spec.mounts_of(MountType::Volume).collect();
        assert_eq!(volumes.len(), 2);
        assert!(volumes.iter().all(|m| m.source.as_deref() == Some("team_api_build-7")));
        assert_eq!(volumes[1].target, "/root/.gradle");
        assert_eq!(
            volumes[0].volume_options.as_ref().and_then(|o| o.driver_config.as_ref()).map(|d| d.name.as_str()),
            Some("rexray")
        );
        assert_eq!(ctx.snapshot().cache_volume_name.as_deref(), Some("team_api_build-7"));
        assert_eq!(listener.lines().len(), 2);
    }

    #[test]
    fn test_blank_tmpfs_dir_is_ignored() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.tmpfs_dir = Some(" ".to_string());
        let spec = apply_tmpfs(skeleton(), &template).build();
        assert!(spec.container().mounts.is_empty());
    }

    #[test]
    fn test_constraints_copied_verbatim() {
        let mut template = AgentTemplate::new("build", "builder:1");
        template.placement_constraints = vec!["node.role==worker".to_string(), "node.labels.ci == true".to_string()];
        let spec = apply_placement_constraints(skeleton(), &template).build();
        assert_eq!(
            spec.task_template.placement.map(|p| p.constraints),
            Some(template.placement_constraints)
        );
    }
}
