// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::resource::{NamedResource, ResourceKind};
use crate::domain::service_spec::ServiceSpecification;

/// Identifier the swarm manager assigns to a created service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub String);

impl ServiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Failures talking to the swarm manager.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("Swarm API unreachable: {0}")]
    Transport(String),
    #[error("Swarm API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to decode swarm API response: {0}")]
    Serialization(String),
    #[error("Swarm API call timed out after {0:?}")]
    Timeout(Duration),
}

/// Rejections from the dispatcher at hand-off time.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("A service creation for '{0}' is already in flight")]
    KeyInFlight(String),
    #[error("Dispatch queue is full, dropping creation of '{0}'")]
    QueueFull(String),
    #[error("Dispatcher has shut down")]
    Closed,
}

/// Read side of the swarm: secret and config listings.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<NamedResource>, DirectoryError>;
}

/// Write side of the swarm: service creation.
#[async_trait]
pub trait ServiceOrchestrator: Send + Sync {
    async fn create_service(&self, spec: &ServiceSpecification) -> Result<ServiceId, DirectoryError>;
}
