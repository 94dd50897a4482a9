// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Platform Command Builder
//!
//! Chooses the command an agent container runs and the image the service is
//! created from:
//!
//! - Linux templates run their configured command.
//! - Windows templates run a fixed PowerShell bootstrap that downloads the
//!   agent jar and connects without reconnecting.
//! - Templates labelled `dind` wrap element 2 of the command in a privileged
//!   nested `docker run` of the template image; the service itself runs the
//!   Docker CLI image.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Bootstrap command synthesis

use crate::domain::cloud_config::CloudConfiguration;
use crate::domain::errors::LaunchError;
use crate::domain::launch::SwarmAgentComputer;
use crate::domain::template::AgentTemplate;

/// Image the service runs in nested-container mode.
pub const DIND_BOOTSTRAP_IMAGE: &str = "docker:17.12";

/// Index of the shell script in `[shell, flags, script]` commands.
const SCRIPT_INDEX: usize = 2;

/// Where and how an agent connects back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEndpoints {
    pub secret: String,
    pub jar_url: String,
    pub jnlp_url: String,
}

impl AgentEndpoints {
    pub fn new(cloud: &CloudConfiguration, computer: &SwarmAgentComputer) -> Self {
        let base = cloud.controller_base_url();
        Self {
            secret: computer.secret.clone(),
            jar_url: format!("{}jnlpJars/slave.jar", base),
            jnlp_url: format!("{}{}slave-agent.jnlp", base, computer.url),
        }
    }
}

/// Image and command of the agent service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub image: String,
    pub command: Vec<String>,
}

pub struct PlatformCommandBuilder<'a> {
    cloud: &'a CloudConfiguration,
}

impl<'a> PlatformCommandBuilder<'a> {
    pub fn new(cloud: &'a CloudConfiguration) -> Self {
        Self { cloud }
    }

    pub fn build(&self, template: &AgentTemplate, endpoints: &AgentEndpoints) -> Result<AgentCommand, LaunchError> {
        let command = if template.is_windows() {
            windows_bootstrap_command(endpoints)
        } else {
            template.command.clone()
        };

        if template.is_dind() {
            let command = self.wrap_in_nested_container(command, &template.image)?;
            Ok(AgentCommand {
                image: DIND_BOOTSTRAP_IMAGE.to_string(),
                command,
            })
        } else {
            Ok(AgentCommand {
                image: template.image.clone(),
                command,
            })
        }
    }

    fn wrap_in_nested_container(&self, mut command: Vec<String>, image: &str) -> Result<Vec<String>, LaunchError> {
        let len = command.len();
        let script = command
            .get_mut(SCRIPT_INDEX)
            .ok_or(LaunchError::CommandTooShort(len))?;

        let network = self.cloud.swarm_network.trim();
        *script = if network.is_empty() {
            format!("docker run --rm --privileged {} sh -xc '{}' ", image, script)
        } else {
            format!(
                "docker run --rm --privileged --network {} {} sh -xc '{}' ",
                network, image, script
            )
        };
        Ok(command)
    }
}

fn windows_bootstrap_command(endpoints: &AgentEndpoints) -> Vec<String> {
    let agent_options = [
        "-jnlpUrl",
        endpoints.jnlp_url.as_str(),
        "-secret",
        endpoints.secret.as_str(),
        "-noReconnect",
    ]
    .join(" ");
    let fetch_and_launch = format!(
        "& {{ Invoke-WebRequest -TimeoutSec 20 -OutFile slave.jar {}; if($?) {{ java -jar slave.jar {} }} }}",
        endpoints.jar_url, agent_options
    );
    vec!["powershell.exe".to_string(), String::new(), fetch_and_launch]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::Platform;

    fn endpoints() -> AgentEndpoints {
        let cloud = CloudConfiguration::new("https://ci.example.com");
        AgentEndpoints::new(&cloud, &SwarmAgentComputer::new("agent-1", "s3cr3t", "1"))
    }

    fn shell_template(label: &str, image: &str) -> AgentTemplate {
        let mut template = AgentTemplate::new(label, image);
        template.command = vec!["sh".to_string(), "-c".to_string(), "build.sh".to_string()];
        template
    }

    #[test]
    fn test_endpoints() {
        let endpoints = endpoints();
        assert_eq!(endpoints.jar_url, "https://ci.example.com/jnlpJars/slave.jar");
        assert_eq!(
            endpoints.jnlp_url,
            "https://ci.example.com/computer/agent-1/slave-agent.jnlp"
        );
    }

    #[test]
    fn test_linux_uses_configured_command() {
        let cloud = CloudConfiguration::new("https://ci.example.com");
        let template = shell_template("maven", "maven:3");
        let built = PlatformCommandBuilder::new(&cloud).build(&template, &endpoints()).unwrap();
        assert_eq!(built.image, "maven:3");
        assert_eq!(built.command, template.command);
    }

    #[test]
    fn test_dind_without_network() {
        let cloud = CloudConfiguration::new("https://ci.example.com");
        let template = shell_template("dind", "docker:17.12");
        let built = PlatformCommandBuilder::new(&cloud).build(&template, &endpoints()).unwrap();
        assert_eq!(built.command[2], "docker run --rm --privileged docker:17.12 sh -xc 'build.sh' ");
        assert_eq!(built.command[..2], ["sh".to_string(), "-c".to_string()]);
    }

    #[test]
    fn test_dind_runs_template_image_nested_on_network() {
        let mut cloud = CloudConfiguration::new("https://ci.example.com");
        cloud.swarm_network = "ci-agents".to_string();
        let template = shell_template("dind linux", "builder:2");
        let built = PlatformCommandBuilder::new(&cloud).build(&template, &endpoints()).unwrap();
        assert_eq!(built.image, DIND_BOOTSTRAP_IMAGE);
        assert_eq!(
            built.command[2],
            "docker run --rm --privileged --network ci-agents builder:2 sh -xc 'build.sh' "
        );
    }

    #[test]
    fn test_dind_rejects_short_command() {
        let cloud = CloudConfiguration::new("https://ci.example.com");
        let mut template = shell_template("dind", "builder:2");
        template.command = vec!["build.sh".to_string()];
        let err = PlatformCommandBuilder::new(&cloud).build(&template, &endpoints()).unwrap_err();
        assert!(matches!(err, LaunchError::CommandTooShort(1)));
    }

    #[test]
    fn test_windows_ignores_configured_command() {
        let cloud = CloudConfiguration::new("https://ci.example.com/");
        let mut template = shell_template("win", "agent:nano");
        template.platform = Platform::Windows;
        let built = PlatformCommandBuilder::new(&cloud).build(&template, &endpoints()).unwrap();
        assert_eq!(built.command.len(), 3);
        assert_eq!(built.command[0], "powershell.exe");
        assert_eq!(built.command[1], "");
        assert_eq!(
            built.command[2],
            "& { Invoke-WebRequest -TimeoutSec 20 -OutFile slave.jar https://ci.example.com/jnlpJars/slave.jar; \
             if($?) { java -jar slave.jar -jnlpUrl https://ci.example.com/computer/agent-1/slave-agent.jnlp \
             -secret s3cr3t -noReconnect } }"
        );
    }
}
