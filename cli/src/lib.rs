// Copyright (c) 2026 swarm-provisioner contributors
// SPDX-License-Identifier: AGPL-3.0
//! Swarm Provisioner CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers and launch request parsing

pub mod commands;
