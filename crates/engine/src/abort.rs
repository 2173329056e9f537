// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abort cascades.
//!
//! When a job fails or an abort is requested, the rest of its tree is
//! wound down: `new`/`waiting` members are aborted immediately,
//! `running` members get a cooperative abort request, and non-terminal
//! ancestors are aborted so no parent outlives a dead child.

use pulse_core::{JobId, JobState, NodeId};
use pulse_storage::MaterializedState;
use std::collections::HashSet;

/// The jobs a cascade touches.
#[derive(Debug, Default, PartialEq)]
pub struct CascadePlan {
    /// Forced to `aborted` immediately (were `new`/`waiting`, plus
    /// non-terminal ancestors of the trigger)
    pub aborted: Vec<JobId>,
    /// Running jobs that get a cooperative abort request, with their
    /// effective node (None = coordinator)
    pub cooperative: Vec<(JobId, Option<NodeId>)>,
}

/// Compute the cascade for a failure of, or abort request on, `target`.
///
/// The closure covers the whole tree: the selector drops the root
/// the moment it aborts, so only running work and the forced `aborted`
/// transitions remain.
pub fn cascade(state: &MaterializedState, target: &str) -> CascadePlan {
    let Some(job) = state.job(target) else {
        return CascadePlan::default();
    };
    let root = job.root.clone();

    // Non-terminal ancestors of the trigger are force-aborted even if
    // running (a tree-extending body whose child died).
    let ancestors: HashSet<String> = state
        .ancestors_of(target)
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();

    let mut plan = CascadePlan::default();

    for member in state.tree_of(root.as_str()) {
        let id = member.id.as_str();
        let is_ancestor = ancestors.contains(id);
        match member.state {
            JobState::New | JobState::Waiting => {
                plan.aborted.push(member.id.clone());
            }
            JobState::Running if is_ancestor => {
                plan.aborted.push(member.id.clone());
                // Its body is still executing; ask it to stop too
                plan.cooperative
                    .push((member.id.clone(), member.node.clone()));
            }
            JobState::Running if id != target => {
                plan.cooperative
                    .push((member.id.clone(), member.node.clone()));
            }
            _ => {}
        }
    }

    // The target itself: a running target is asked to abort
    // cooperatively; its bookkeeping flips when the result arrives.
    if job.state == JobState::Running {
        plan.cooperative.push((job.id.clone(), job.node.clone()));
    }

    plan
}

#[cfg(test)]
#[path = "abort_tests.rs"]
mod tests;
