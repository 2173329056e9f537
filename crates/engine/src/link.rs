// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node link: how the coordinator reaches remote nodes.
//!
//! The engine only needs two sends; the daemon implements them over its
//! long-lived node channels. `FakeNodeLink` records frames so runtime
//! tests can play the remote side by injecting `job:result` events.

use async_trait::async_trait;
use parking_lot::Mutex;
use pulse_core::{Context, JobId, NodeId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Frame asking a node to start a job body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartJob {
    pub id: JobId,
    pub body_type: String,
    pub parameters: serde_json::Value,
    pub context: Context,
}

#[derive(Debug, Error)]
pub enum NodeLinkError {
    #[error("node unreachable: {0}")]
    Unreachable(String),
}

/// Transport from the coordinator to remote nodes.
#[async_trait]
pub trait NodeLink: Send + Sync {
    async fn start_job(&self, node: &NodeId, start: StartJob) -> Result<(), NodeLinkError>;

    /// Best-effort; failures are logged and dropped by the caller.
    async fn abort_job(&self, node: &NodeId, job: &JobId) -> Result<(), NodeLinkError>;
}

/// Link for single-node deployments: every remote send fails, which the
/// dispatcher converts into `dispatch_failed` after its retries.
#[derive(Default, Clone, Copy)]
pub struct LocalOnlyLink;

#[async_trait]
impl NodeLink for LocalOnlyLink {
    async fn start_job(&self, node: &NodeId, _start: StartJob) -> Result<(), NodeLinkError> {
        Err(NodeLinkError::Unreachable(format!(
            "no channel to node {node}"
        )))
    }

    async fn abort_job(&self, node: &NodeId, _job: &JobId) -> Result<(), NodeLinkError> {
        Err(NodeLinkError::Unreachable(format!(
            "no channel to node {node}"
        )))
    }
}

/// Recorded remote sends plus a reachability switch for tests.
#[derive(Default)]
struct FakeLinkState {
    started: Vec<(NodeId, StartJob)>,
    aborted: Vec<(NodeId, JobId)>,
    unreachable: bool,
}

/// Test link capturing every frame the coordinator sends.
#[derive(Clone, Default)]
pub struct FakeNodeLink {
    state: Arc<Mutex<FakeLinkState>>,
}

impl FakeNodeLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail as unreachable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn started(&self) -> Vec<(NodeId, StartJob)> {
        self.state.lock().started.clone()
    }

    pub fn aborted(&self) -> Vec<(NodeId, JobId)> {
        self.state.lock().aborted.clone()
    }
}

#[async_trait]
impl NodeLink for FakeNodeLink {
    async fn start_job(&self, node: &NodeId, start: StartJob) -> Result<(), NodeLinkError> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(NodeLinkError::Unreachable("fake link down".into()));
        }
        state.started.push((node.clone(), start));
        Ok(())
    }

    async fn abort_job(&self, node: &NodeId, job: &JobId) -> Result<(), NodeLinkError> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(NodeLinkError::Unreachable("fake link down".into()));
        }
        state.aborted.push((node.clone(), job.clone()));
        Ok(())
    }
}
