// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Job Naming Domain Service
//!
//! Derives cluster-safe identifiers from human-readable job names. Cache
//! volumes are named after the job so repeated builds of the same job land
//! on the same named volume.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Deterministic job-name sanitisation and cache volume naming

/// Characters that are replaced by `_` in derived identifiers.
pub const DISALLOWED_JOB_NAME_CHARS: [char; 6] = ['/', '-', ',', ' ', '=', '.'];

/// Replace every disallowed character of a job name with `_`.
///
/// The mapping is total and idempotent: sanitising an already sanitised
/// name returns it unchanged.
///
/// ```
/// use swarm_provisioner_core::domain::naming::sanitize_job_name;
///
/// assert_eq!(sanitize_job_name("folder/my-job,a=b c.d"), "folder_my_job_a_b_c_d");
/// ```
pub fn sanitize_job_name(job_name: &str) -> String {
    job_name
        .chars()
        .map(|c| if DISALLOWED_JOB_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Name of the cache volume shared by every build of `job_name` on agents
/// carrying `agent_volume_name`.
pub fn cache_volume_name(job_name: &str, agent_volume_name: &str) -> String {
    format!("{}-{}", sanitize_job_name(job_name), agent_volume_name)
}
