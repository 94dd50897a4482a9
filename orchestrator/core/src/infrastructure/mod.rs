// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod docker_swarm;
pub mod event_bus;
pub mod static_directory;

pub use docker_swarm::DockerSwarmClient;
pub use event_bus::{EventBus, EventBusError, EventReceiver};
pub use static_directory::StaticResourceDirectory;
