// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::resource::ResourceKind;

/// Progress and failures of agent launches, published on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LaunchEvent {
    LaunchStarted {
        agent: String,
        label: String,
        image: String,
        started_at: DateTime<Utc>,
    },
    /// A referenced secret or config does not exist; the attachment was skipped.
    ResourceNotFound {
        agent: String,
        kind: ResourceKind,
        name: String,
        reported_at: DateTime<Utc>,
    },
    /// Listing a resource kind failed; every attachment of that kind was skipped.
    CategoryAbandoned {
        agent: String,
        kind: ResourceKind,
        error: String,
        reported_at: DateTime<Utc>,
    },
    ServiceDispatched {
        agent: String,
        dispatched_at: DateTime<Utc>,
    },
    LaunchFailed {
        agent: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    ServiceCreated {
        agent: String,
        service_id: String,
        created_at: DateTime<Utc>,
    },
    ServiceCreateFailed {
        agent: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl LaunchEvent {
    pub fn agent(&self) -> &str {
        match self {
            LaunchEvent::LaunchStarted { agent, .. }
            | LaunchEvent::ResourceNotFound { agent, .. }
            | LaunchEvent::CategoryAbandoned { agent, .. }
            | LaunchEvent::ServiceDispatched { agent, .. }
            | LaunchEvent::LaunchFailed { agent, .. }
            | LaunchEvent::ServiceCreated { agent, .. }
            | LaunchEvent::ServiceCreateFailed { agent, .. } => agent,
        }
    }
}
