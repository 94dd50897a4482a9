// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0

// Fixed resource listings, used to render specifications without a swarm
// manager (`swarm-provisioner render --offline`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::resource::{NamedResource, ResourceKind};
use crate::domain::swarm::{DirectoryError, ResourceDirectory};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticResourceDirectory {
    #[serde(default)]
    pub secrets: Vec<NamedResource>,
    #[serde(default)]
    pub configs: Vec<NamedResource>,
}

impl StaticResourceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(mut self, resource: NamedResource) -> Self {
        match resource.kind {
            ResourceKind::Secret => self.secrets.push(resource),
            ResourceKind::Config => self.configs.push(resource),
        }
        self
    }
}

#[async_trait]
impl ResourceDirectory for StaticResourceDirectory {
    async fn list_resources(&self, kind: ResourceKind) -> Result<Vec<NamedResource>, DirectoryError> {
        Ok(match kind {
            ResourceKind::Secret => self.secrets.clone(),
            ResourceKind::Config => self.configs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listings_are_split_by_kind() {
        let directory = StaticResourceDirectory::new()
            .with_resource(NamedResource::new(ResourceKind::Secret, "abc123", "db-cred"))
            .with_resource(NamedResource::new(ResourceKind::Config, "cfg1", "settings"));

        let secrets = directory.list_resources(ResourceKind::Secret).await.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].id, "abc123");
        let configs = directory.list_resources(ResourceKind::Config).await.unwrap();
        assert_eq!(configs[0].name, "settings");
    }
}
