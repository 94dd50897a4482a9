// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod command;
pub mod dispatcher;
pub mod enricher;
pub mod launcher;
pub mod resolver;

// Re-export use cases for convenience
pub use command::{AgentCommand, AgentEndpoints, PlatformCommandBuilder};
pub use dispatcher::{DispatchWorkers, ServiceDispatcher, SwarmDispatcher};
pub use enricher::{EnrichmentScope, ServiceSpecEnricher};
pub use launcher::{AgentLauncher, ComputerLauncher, LaunchServices};
pub use resolver::{NamedResourceResolver, Resolution, ResourceCatalog};
