// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types and rules of agent provisioning. The only I/O seams are the
//! [`swarm::ResourceDirectory`] and [`swarm::ServiceOrchestrator`] traits.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer

pub mod cloud_config;
pub mod errors;
pub mod events;
pub mod launch;
pub mod naming;
pub mod resource;
pub mod service_spec;
pub mod swarm;
pub mod template;
