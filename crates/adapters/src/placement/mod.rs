// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Placement: which hearts may run an instance type.

use async_trait::async_trait;
use pulse_core::{Node, NodeId, NodeRole, NodeState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("no active heart supports runtime {runtime} version {version}")]
    NoCandidates { runtime: String, version: String },
}

/// Chooses candidate nodes for an instance type.
#[async_trait]
pub trait Placement: Send + Sync {
    async fn select(
        &self,
        nodes: &[Node],
        runtime: &str,
        version: &str,
    ) -> Result<Vec<NodeId>, PlacementError>;
}

/// Default policy: every active heart advertising the runtime/version.
#[derive(Clone, Copy, Default)]
pub struct DefaultPlacement;

#[async_trait]
impl Placement for DefaultPlacement {
    async fn select(
        &self,
        nodes: &[Node],
        runtime: &str,
        version: &str,
    ) -> Result<Vec<NodeId>, PlacementError> {
        let mut candidates: Vec<&Node> = nodes
            .iter()
            .filter(|n| n.state == NodeState::Active)
            .filter(|n| n.has_role(NodeRole::Heart))
            .filter(|n| n.supports_runtime(runtime, version))
            .collect();
        // Deterministic order so repeated placement is stable
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        if candidates.is_empty() {
            return Err(PlacementError::NoCandidates {
                runtime: runtime.to_string(),
                version: version.to_string(),
            });
        }
        Ok(candidates.into_iter().map(|n| n.id.clone()).collect())
    }
}
