// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster node projection.
//!
//! The job manager only reads nodes as dispatch targets and affinity
//! keys; the full node inventory lives outside this subsystem.

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a node takes in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Owns cluster state and runs the job coordinator
    Pacemaker,
    /// Executes application instances
    Heart,
    /// Forwards external traffic
    Router,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Pacemaker => write!(f, "pacemaker"),
            NodeRole::Heart => write!(f, "heart"),
            NodeRole::Router => write!(f, "router"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Active,
    Inactive,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Active => write!(f, "active"),
            NodeState::Inactive => write!(f, "inactive"),
        }
    }
}

/// A registered cluster node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Hostname or address the node is reachable at
    pub route: String,
    pub port: u16,
    pub roles: Vec<NodeRole>,
    /// Free-form capability tags, e.g. `{"runtimes": {"shell": ["1"]}}`
    #[serde(default)]
    pub tags: serde_json::Value,
    pub state: NodeState,
    /// Epoch ms of the last heartbeat received from this node
    #[serde(default)]
    pub last_heard: u64,
}

impl Node {
    pub fn has_role(&self, role: NodeRole) -> bool {
        self.roles.contains(&role)
    }

    /// Whether this node advertises the given runtime name and version.
    pub fn supports_runtime(&self, runtime: &str, version: &str) -> bool {
        self.tags
            .get("runtimes")
            .and_then(|r| r.get(runtime))
            .and_then(|v| v.as_array())
            .map(|versions| versions.iter().any(|v| v.as_str() == Some(version)))
            .unwrap_or(false)
    }
}
