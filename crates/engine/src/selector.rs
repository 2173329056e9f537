// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runnable selector.
//!
//! Produces the frontier of each armed tree: `waiting` jobs whose
//! children have all reached `success`. The frontier is re-evaluated on
//! every terminal transition. Tie-break is `time_created` ascending,
//! then job id, so selection is deterministic.

use crate::dispatch::Dispatcher;
use pulse_core::{JobId, JobState, NodeId};
use pulse_storage::MaterializedState;
use std::collections::HashMap;

/// Default per-node concurrency cap.
pub const DEFAULT_NODE_CAP: usize = 4;

/// Frontier of one tree: runnable jobs in deterministic order.
pub fn frontier(state: &MaterializedState, root: &str) -> Vec<JobId> {
    let mut runnable: Vec<_> = state
        .tree_of(root)
        .into_iter()
        .filter(|job| job.state == JobState::Waiting)
        .filter(|job| state.children_all_succeeded(job.id.as_str()))
        .collect();
    runnable.sort_by(|a, b| {
        a.time_created
            .cmp(&b.time_created)
            .then_with(|| a.id.cmp(&b.id))
    });
    runnable.into_iter().map(|job| job.id.clone()).collect()
}

/// Select dispatchable jobs across all armed live trees.
///
/// Jobs already in flight are skipped; per-node occupancy (in-flight
/// plus selections made in this pass) is bounded by `node_cap`. Jobs
/// without a node run on the coordinator and count against its cap.
pub fn select_runnable(
    state: &MaterializedState,
    dispatcher: &Dispatcher,
    coordinator: &NodeId,
    node_cap: usize,
) -> Vec<JobId> {
    let mut roots = state.live_armed_roots();
    roots.sort_by(|a, b| {
        a.time_created
            .cmp(&b.time_created)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut occupancy: HashMap<String, usize> = HashMap::new();
    let mut selected = Vec::new();

    for root in roots {
        for id in frontier(state, root.id.as_str()) {
            if dispatcher.contains(id.as_str()) {
                continue;
            }
            let Some(job) = state.job(id.as_str()) else {
                continue;
            };
            // Affinity: no node, or the coordinator's own id, runs locally
            let effective: Option<&NodeId> = match &job.node {
                Some(node) if node != coordinator => Some(node),
                _ => None,
            };
            let node_key = effective
                .map(|node| node.as_str().to_string())
                .unwrap_or_default();

            let in_flight = dispatcher.count_for_node(effective);
            let planned = occupancy.get(&node_key).copied().unwrap_or(0);
            if in_flight + planned >= node_cap {
                continue;
            }

            occupancy.insert(node_key, planned + 1);
            selected.push(id);
        }
    }

    selected
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
