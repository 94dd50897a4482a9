// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Named swarm resources (secrets and configs) and the `source:target`
//! references agent templates use to point at them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::LaunchError;

/// Kind of remotely stored value an agent template can attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Secret,
    Config,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Secret => "secret",
            ResourceKind::Config => "config",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secret or config as listed by the swarm manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedResource {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
}

impl NamedResource {
    pub fn new(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Split a `left:right` template entry.
///
/// Only the first two segments are used; anything after a second `:` is
/// ignored. Both segments must be non-empty and are kept verbatim, so
/// names still match exactly.
fn split_pair(entry: &str) -> Option<(&str, &str)> {
    let mut parts = entry.split(':');
    let left = parts.next()?;
    let right = parts.next()?;
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((left, right))
}

/// `name:mountPath` reference to a secret or config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub kind: ResourceKind,
    pub name: String,
    pub mount_path: String,
}

impl ResourceReference {
    pub fn parse(kind: ResourceKind, entry: &str) -> Result<Self, LaunchError> {
        let (name, mount_path) =
            split_pair(entry).ok_or_else(|| LaunchError::MalformedReference {
                kind,
                reference: entry.to_string(),
            })?;
        Ok(Self {
            kind,
            name: name.to_string(),
            mount_path: mount_path.to_string(),
        })
    }
}

/// `source:target` host bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBind {
    pub source: String,
    pub target: String,
}

impl HostBind {
    pub fn parse(entry: &str) -> Result<Self, LaunchError> {
        let (source, target) =
            split_pair(entry).ok_or_else(|| LaunchError::MalformedHostBind(entry.to_string()))?;
        Ok(Self {
            source: source.to_string(),
            target: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let reference = ResourceReference::parse(ResourceKind::Secret, "db-cred:/run/secrets/db").unwrap();
        assert_eq!(reference.name, "db-cred");
        assert_eq!(reference.mount_path, "/run/secrets/db");
        assert_eq!(reference.kind, ResourceKind::Secret);
    }

    #[test]
    fn test_reference_name_is_not_trimmed() {
        let reference = ResourceReference::parse(ResourceKind::Secret, "db-cred :/run/secrets/db").unwrap();
        assert_eq!(reference.name, "db-cred ");
        assert_ne!(reference.name, "db-cred");
    }

    #[test]
    fn test_reference_without_separator_is_rejected() {
        let err = ResourceReference::parse(ResourceKind::Config, "just-a-name").unwrap_err();
        assert!(matches!(err, LaunchError::MalformedReference { kind: ResourceKind::Config, .. }));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_host_bind_ignores_extra_segments() {
        let bind = HostBind::parse("/var/run/docker.sock:/var/run/docker.sock:ro").unwrap();
        assert_eq!(bind.source, "/var/run/docker.sock");
        assert_eq!(bind.target, "/var/run/docker.sock");
    }

    #[test]
    fn test_host_bind_with_empty_side_is_rejected() {
        assert!(HostBind::parse("/a:").is_err());
        assert!(HostBind::parse(":/b").is_err());
        assert!(HostBind::parse("/a").is_err());
    }
}
