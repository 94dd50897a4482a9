// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the swarm-provisioner CLI

pub mod config;
pub mod launch;

pub use self::config::ConfigCommand;
pub use self::launch::{LaunchArgs, LaunchRequest, RenderArgs};
