// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application instance projection.
//!
//! Instances are placed on heart nodes by the coordinate trees. The job
//! manager owns their state transitions; everything else about
//! applications and versions is opaque to it.

use crate::id::{InstanceId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Instance row persisted, port allocated, nothing started yet
    Registered,
    Running,
    Stopped,
    Error,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Registered => write!(f, "registered"),
            InstanceState::Running => write!(f, "running"),
            InstanceState::Stopped => write!(f, "stopped"),
            InstanceState::Error => write!(f, "error"),
        }
    }
}

/// An application instance placed on a heart node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: InstanceId,
    /// Opaque identifier of the instance type being run
    pub instance_type: String,
    pub node: NodeId,
    pub port: u16,
    pub state: InstanceState,
    /// Hostnames the router should serve this instance under
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Version label used to build routing set keys
    #[serde(default)]
    pub version: String,
    /// Command template; `%(port)d` is replaced at startup
    #[serde(default)]
    pub launch_command: String,
}
