// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Swarm Provisioner CLI
//!
//! The `swarm-provisioner` binary launches build agents as Docker Swarm
//! services from a cloud configuration manifest and a launch request.
//!
//! ## Commands
//!
//! - `swarm-provisioner render` - Build the enriched service request without creating it
//! - `swarm-provisioner launch` - Launch an agent against the local swarm manager
//! - `swarm-provisioner config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use swarm_provisioner::commands::{self, ConfigCommand, LaunchArgs, RenderArgs};

/// Swarm Provisioner - Run build agents as swarm services
#[derive(Parser)]
#[command(name = "swarm-provisioner")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SWARM_PROVISIONER_CONFIG",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SWARM_PROVISIONER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the create-service request for a launch without creating it
    #[command(name = "render")]
    Render(RenderArgs),

    /// Launch a build agent on the swarm
    #[command(name = "launch")]
    Launch(LaunchArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Render(args)) => commands::launch::render(args, cli.config).await,
        Some(Commands::Launch(args)) => commands::launch::launch(args, cli.config).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
