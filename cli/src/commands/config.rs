// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use swarm_provisioner_core::domain::cloud_config::SwarmCloudManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./swarm-cloud.yaml)
        #[arg(short, long, default_value = "./swarm-cloud.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SwarmCloudManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SWARM_PROVISIONER_CONFIG: {}",
            std::env::var("SWARM_PROVISIONER_CONFIG")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./swarm-cloud.yaml");
        println!("  4. ~/.swarm-provisioner/config.yaml");
        println!("  5. /etc/swarm-provisioner/config.yaml");
        println!();
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Cloud:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Controller: {}", spec.controller_base_url());
    if let Some(tunnel) = &spec.tunnel {
        println!("  Tunnel: {}", tunnel);
    }
    println!(
        "  Network: {}",
        if spec.swarm_network.is_empty() { "(default)" } else { spec.swarm_network.as_str() }
    );
    println!(
        "  Cache driver: {}",
        if spec.cache_driver_name.is_empty() { "(engine default)" } else { spec.cache_driver_name.as_str() }
    );
    println!(
        "  Docker socket: {}",
        spec.docker_socket_path.as_deref().unwrap_or("(auto-detect)")
    );
    println!();

    println!("{}", "Dispatcher:".bold());
    println!("  Workers: {}", spec.dispatch_workers);
    println!("  Queue capacity: {}", spec.dispatch_queue_capacity);
    println!("  Directory timeout: {}s", spec.directory_timeout_secs);
    println!();

    println!("{}", "Agent Templates:".bold());
    if spec.agent_templates.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for template in &spec.agent_templates {
        println!("  {} ({:?})", template.label.bold(), template.platform);
        println!("    Image: {}", template.image);
        if template.is_dind() {
            println!("    Mode: nested container");
        }
        if !template.cache_dirs.is_empty() {
            println!("    Cache dirs: {}", template.cache_dirs.join(", "));
        }
        if !template.secrets.is_empty() || !template.configs.is_empty() {
            println!(
                "    Secrets: {}, configs: {}",
                template.secrets.len(),
                template.configs.len()
            );
        }
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SwarmCloudManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/swarm-cloud-with-examples.yaml")
    } else {
        include_str!("../../templates/swarm-cloud-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_samples_are_valid() {
        for sample in [
            include_str!("../../templates/swarm-cloud-minimal.yaml"),
            include_str!("../../templates/swarm-cloud-with-examples.yaml"),
        ] {
            let manifest = SwarmCloudManifest::from_yaml_str(sample).unwrap();
            manifest.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("swarm-cloud.yaml");
        generate(output.clone(), true).await.unwrap();
        validate(Some(output)).await.unwrap();
    }
}
