// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Provisioner Core
//!
//! Launches build agents as Docker Swarm services: resolves the agent
//! template for a queued task, builds and enriches the create-service
//! request, records an audit snapshot and hands creation to a worker pool.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Domain:** templates, launch context, service specification, errors
//! - **Application:** launcher, enricher, command builder, resolver, dispatcher
//! - **Infrastructure:** bollard swarm client, event bus, offline directory

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
