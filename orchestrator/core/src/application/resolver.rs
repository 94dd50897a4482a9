// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Named Resource Resolver
//!
//! Resolves `name:mountPath` secret and config references to the opaque
//! identifiers the swarm manager expects. Every launch lists each resource
//! kind once; nothing is cached between launches.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Exact-name lookup against the swarm resource directory

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::resource::{NamedResource, ResourceKind};
use crate::domain::swarm::{DirectoryError, ResourceDirectory};

/// Outcome of a lookup that reached the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    NotFound,
}

/// One listing of a resource kind.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    entries: Vec<NamedResource>,
}

impl ResourceCatalog {
    pub fn new(entries: Vec<NamedResource>) -> Self {
        Self { entries }
    }

    /// First entry whose name equals `name` exactly.
    pub fn resolve(&self, name: &str) -> Resolution {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| Resolution::Found(entry.id.clone()))
            .unwrap_or(Resolution::NotFound)
    }
}

pub struct NamedResourceResolver {
    directory: Arc<dyn ResourceDirectory>,
    timeout: Duration,
}

impl NamedResourceResolver {
    pub fn new(directory: Arc<dyn ResourceDirectory>, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// List every resource of `kind`, bounded by the directory timeout.
    pub async fn catalog(&self, kind: ResourceKind) -> Result<ResourceCatalog, DirectoryError> {
        let entries = tokio::time::timeout(self.timeout, self.directory.list_resources(kind))
            .await
            .map_err(|_| DirectoryError::Timeout(self.timeout))??;

        // Listings are expected to be homogeneous; drop anything else.
        let entries: Vec<NamedResource> = entries.into_iter().filter(|e| e.kind == kind).collect();
        debug!(kind = %kind, count = entries.len(), "Listed swarm resources");
        Ok(ResourceCatalog::new(entries))
    }

    /// One-shot lookup: list `kind` and match `name`.
    pub async fn resolve(&self, kind: ResourceKind, name: &str) -> Result<Resolution, DirectoryError> {
        Ok(self.catalog(kind).await?.resolve(name))
    }
}
