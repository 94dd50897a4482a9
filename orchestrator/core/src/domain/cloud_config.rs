// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

// Swarm Cloud Configuration
//
// Defines the configuration schema the launcher reads, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Controller and agent connection endpoints
// - Swarm network and cache volume driver
// - Dispatcher sizing and directory call timeout
// - Per-label agent templates

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::template::AgentTemplate;

pub const API_VERSION: &str = "swarm-provisioner/v1";
pub const KIND: &str = "SwarmCloud";

/// Top-level Kubernetes-style cloud configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmCloudManifest {
    /// API version (must be "swarm-provisioner/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SwarmCloud")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: CloudConfiguration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable cloud name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Process-wide settings shared by every launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfiguration {
    /// Base URL of the build controller agents connect back to
    pub controller_url: String,

    /// Optional `host:port` tunnel agents use for the inbound connection.
    /// Published to agents through the connection descriptor served by the
    /// controller, not through the service environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<String>,

    /// Overlay network agents (and nested containers) attach to
    #[serde(default)]
    pub swarm_network: String,

    /// Volume driver for per-job cache volumes (empty = engine default)
    #[serde(default)]
    pub cache_driver_name: String,

    /// Path to Docker socket
    /// Default: platform default connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_socket_path: Option<String>,

    /// Number of workers performing service creation
    #[serde(default = "default_dispatch_workers")]
    pub dispatch_workers: usize,

    /// Pending creations buffered before new launches are rejected
    #[serde(default = "default_dispatch_queue_capacity")]
    pub dispatch_queue_capacity: usize,

    /// Upper bound for secret/config listing calls
    #[serde(default = "default_directory_timeout_secs")]
    pub directory_timeout_secs: u64,

    #[serde(default)]
    pub agent_templates: Vec<AgentTemplate>,
}

impl CloudConfiguration {
    pub fn new(controller_url: impl Into<String>) -> Self {
        Self {
            controller_url: controller_url.into(),
            tunnel: None,
            swarm_network: String::new(),
            cache_driver_name: String::new(),
            docker_socket_path: None,
            dispatch_workers: default_dispatch_workers(),
            dispatch_queue_capacity: default_dispatch_queue_capacity(),
            directory_timeout_secs: default_directory_timeout_secs(),
            agent_templates: vec![],
        }
    }

    /// Controller URL with exactly one trailing `/`.
    pub fn controller_base_url(&self) -> String {
        if self.controller_url.ends_with('/') {
            self.controller_url.clone()
        } else {
            format!("{}/", self.controller_url)
        }
    }

    /// First template (in configuration order) serving `label`.
    pub fn template_for_label(&self, label: &str) -> Option<&AgentTemplate> {
        self.agent_templates.iter().find(|t| t.serves_label(label))
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_secs(self.directory_timeout_secs)
    }
}

fn default_dispatch_workers() -> usize {
    4
}

fn default_dispatch_queue_capacity() -> usize {
    64
}

fn default_directory_timeout_secs() -> u64 {
    30
}

impl Default for SwarmCloudManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "swarm-cloud".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
            },
            spec: CloudConfiguration::new("http://localhost:8080/"),
        }
    }
}

impl SwarmCloudManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SWARM_PROVISIONER_CONFIG environment variable
    /// 2. ./swarm-cloud.yaml (working directory)
    /// 3. ~/.swarm-provisioner/config.yaml (user home)
    /// 4. /etc/swarm-provisioner/config.yaml (system, Unix) or C:\ProgramData\SwarmProvisioner\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SWARM_PROVISIONER_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./swarm-cloud.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".swarm-provisioner").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/swarm-provisioner/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\SwarmProvisioner\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using empty defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SWARM_PROVISIONER_CONTROLLER_URL") {
            tracing::info!("Environment override: SWARM_PROVISIONER_CONTROLLER_URL={}", val);
            self.spec.controller_url = val;
        }
        if let Ok(val) = std::env::var("SWARM_PROVISIONER_NETWORK") {
            tracing::info!("Environment override: SWARM_PROVISIONER_NETWORK={}", val);
            self.spec.swarm_network = val;
        }
        if let Ok(val) = std::env::var("SWARM_PROVISIONER_CACHE_DRIVER") {
            tracing::info!("Environment override: SWARM_PROVISIONER_CACHE_DRIVER={}", val);
            self.spec.cache_driver_name = val;
        }
        if let Ok(val) = std::env::var("SWARM_PROVISIONER_DOCKER_SOCKET") {
            tracing::info!("Environment override: SWARM_PROVISIONER_DOCKER_SOCKET={}", val);
            self.spec.docker_socket_path = Some(val);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        if !(spec.controller_url.starts_with("http://") || spec.controller_url.starts_with("https://")) {
            anyhow::bail!(
                "spec.controller_url must be an http(s) URL, got '{}'",
                spec.controller_url
            );
        }

        if let Some(tunnel) = &spec.tunnel {
            match tunnel.rsplit_once(':') {
                Some((_, port)) if port.parse::<u16>().is_ok() => {}
                _ => anyhow::bail!("spec.tunnel must be 'host:port', got '{}'", tunnel),
            }
        }

        if spec.dispatch_workers == 0 {
            anyhow::bail!("spec.dispatch_workers must be at least 1");
        }

        if spec.directory_timeout_secs == 0 {
            anyhow::bail!("spec.directory_timeout_secs must be at least 1");
        }

        if spec.dispatch_queue_capacity == 0 {
            anyhow::bail!("spec.dispatch_queue_capacity must be at least 1");
        }

        let mut seen = HashSet::new();
        for template in &spec.agent_templates {
            if template.labels().next().is_none() {
                anyhow::bail!("Agent template for image '{}' has no label", template.image);
            }
            if template.image.is_empty() {
                anyhow::bail!("Agent template '{}' has no image", template.label);
            }
            for label in template.labels() {
                if !seen.insert(label.to_string()) {
                    tracing::warn!(
                        label = %label,
                        "Label is served by more than one agent template; the first one wins"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
apiVersion: swarm-provisioner/v1
kind: SwarmCloud
metadata:
  name: ci-swarm
spec:
  controller_url: https://ci.example.com
  swarm_network: ci-agents
  cache_driver_name: local
  agent_templates:
    - label: maven java
      image: maven:3-jdk-17
      cache_dirs: [/root/.m2]
    - label: dind
      image: docker:17.12
      command: [sh, -c, build.sh]
"#;

    #[test]
    fn test_default_manifest() {
        let manifest = SwarmCloudManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let manifest = SwarmCloudManifest::from_yaml_str(SAMPLE).unwrap();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.spec.dispatch_workers, 4);
        assert_eq!(manifest.spec.directory_timeout(), Duration::from_secs(30));
        assert_eq!(manifest.spec.agent_templates.len(), 2);
        assert_eq!(
            manifest.spec.template_for_label("java").map(|t| t.image.as_str()),
            Some("maven:3-jdk-17")
        );
        assert!(manifest.spec.template_for_label("gradle").is_none());
    }

    #[test]
    fn test_controller_base_url_gets_one_trailing_slash() {
        assert_eq!(
            CloudConfiguration::new("https://ci.example.com").controller_base_url(),
            "https://ci.example.com/"
        );
        assert_eq!(
            CloudConfiguration::new("https://ci.example.com/jenkins/").controller_base_url(),
            "https://ci.example.com/jenkins/"
        );
    }

    #[test]
    fn test_validation() {
        let mut manifest = SwarmCloudManifest::from_yaml_str(SAMPLE).unwrap();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.controller_url = "ci.example.com".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.controller_url = "https://ci.example.com".to_string();

        manifest.spec.tunnel = Some("ci.example.com".to_string());
        assert!(manifest.validate().is_err());
        manifest.spec.tunnel = Some("ci.example.com:50000".to_string());
        assert!(manifest.validate().is_ok());

        manifest.spec.dispatch_workers = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.dispatch_workers = 2;

        manifest.spec.directory_timeout_secs = 0;
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("directory_timeout_secs"));
        manifest.spec.directory_timeout_secs = 5;
        assert!(manifest.validate().is_ok());

        manifest.spec.agent_templates.push(AgentTemplate::new("   ", "img"));
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarm-cloud.yaml");
        let manifest = SwarmCloudManifest::from_yaml_str(SAMPLE).unwrap();
        manifest.to_yaml_file(&path).unwrap();

        let loaded = SwarmCloudManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "ci-swarm");
        assert_eq!(loaded.spec.agent_templates[1].command, vec!["sh", "-c", "build.sh"]);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SwarmCloudManifest::load_or_default(Some(dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }
}
