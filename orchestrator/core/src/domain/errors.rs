// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Launch Error Taxonomy
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Errors surfaced by a single agent launch attempt
//!
//! Configuration errors abort the launch before any remote call. Launch I/O
//! errors happen after enrichment (snapshot, dispatch) and are recorded on
//! the agent info record as a failed launch.

use thiserror::Error;

use crate::domain::resource::ResourceKind;
use crate::domain::swarm::DispatchError;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("This launcher can only handle swarm agent computers, got '{0}'")]
    IncompatibleTarget(String),

    #[error("Task '{0}' has no assigned label")]
    MissingLabel(String),

    #[error("No agent template configured for label '{0}'")]
    UnknownLabel(String),

    #[error("Malformed host bind '{0}': expected 'source:target'")]
    MalformedHostBind(String),

    #[error("Malformed {kind} reference '{reference}': expected 'name:mountPath'")]
    MalformedReference { kind: ResourceKind, reference: String },

    #[error("Nested-container mode needs a command with at least 3 elements, got {0}")]
    CommandTooShort(usize),

    #[error("Failed to apply custom workspace '{path}': {reason}")]
    Workspace { path: String, reason: String },

    #[error("Failed to serialize service request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to dispatch service creation: {0}")]
    Dispatch(#[from] DispatchError),
}

impl LaunchError {
    /// Errors caused by the target, the task or the template rather than by
    /// the swarm or the dispatcher.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            LaunchError::IncompatibleTarget(_)
                | LaunchError::MissingLabel(_)
                | LaunchError::UnknownLabel(_)
                | LaunchError::MalformedHostBind(_)
                | LaunchError::MalformedReference { .. }
                | LaunchError::CommandTooShort(_)
        )
    }
}
