// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized job store rebuilt from WAL replay.
//!
//! This is the hot in-memory projection of the persistent event log:
//! jobs with their parent/child indexes, the armed-root set, and the
//! node/instance projections the coordinate bodies read. `apply_event`
//! is total and idempotent so the same WAL entry can be applied more
//! than once (crash between apply and mark-processed).

use pulse_core::{Event, InstanceRecord, JobId, JobRecord, JobState, Node, NodeState};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Materialized state from WAL replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    /// All job records by id
    pub jobs: HashMap<String, JobRecord>,
    /// Children by parent id, in creation order
    #[serde(default)]
    pub children: HashMap<String, Vec<JobId>>,
    /// All members of a tree by root id, in creation order (root included)
    #[serde(default)]
    pub members: HashMap<String, Vec<JobId>>,
    /// Roots that have been allowed to execute
    #[serde(default)]
    pub armed: HashSet<String>,
    /// Registered nodes by id
    #[serde(default)]
    pub nodes: HashMap<String, Node>,
    /// Placed instances by id
    #[serde(default)]
    pub instances: HashMap<String, InstanceRecord>,
}

impl MaterializedState {
    /// Apply an event to the state.
    ///
    /// Never fails: events that cannot be applied (duplicate creation,
    /// conflicting terminal transition) are logged and skipped so replay
    /// always terminates.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::JobCreated {
                id,
                root,
                parent,
                body_type,
                parameters,
                context,
                node,
                title,
                created_at_ms,
            } => {
                if self.jobs.contains_key(id.as_str()) {
                    return;
                }
                let mut record = JobRecord {
                    id: id.clone(),
                    root: root.clone(),
                    parent: parent.clone(),
                    body_type: body_type.clone(),
                    parameters: parameters.clone(),
                    context: context.clone(),
                    node: node.clone(),
                    title: title.clone(),
                    summary: None,
                    state: JobState::New,
                    time_created: *created_at_ms,
                    time_started: None,
                    time_finished: None,
                    log_offset_end: 0,
                };
                // Jobs added under an armed root are immediately eligible
                if self.armed.contains(root.as_str()) {
                    record.state = JobState::Waiting;
                }
                if let Some(parent) = parent {
                    self.children
                        .entry(parent.as_str().to_string())
                        .or_default()
                        .push(id.clone());
                }
                self.members
                    .entry(root.as_str().to_string())
                    .or_default()
                    .push(id.clone());
                self.jobs.insert(id.as_str().to_string(), record);
            }

            Event::JobArmed { root } => {
                // Arming twice is a no-op
                if !self.armed.insert(root.as_str().to_string()) {
                    return;
                }
                let member_ids = self.members.get(root.as_str()).cloned().unwrap_or_default();
                for id in member_ids {
                    if let Some(job) = self.jobs.get_mut(id.as_str()) {
                        if job.state == JobState::New {
                            job.state = JobState::Waiting;
                        }
                    }
                }
            }

            Event::JobStatus {
                id,
                state,
                summary,
                at,
                log_offset,
            } => {
                let Some(job) = self.jobs.get_mut(id.as_str()) else {
                    warn!(id = %id, "job:status for unknown job");
                    return;
                };
                if let Some(offset) = log_offset {
                    job.log_offset_end = job.log_offset_end.max(*offset);
                }
                if job.state == *state {
                    // Duplicate delivery of the same state is ignored
                    return;
                }
                if let Err(e) = job.transition(*state, summary.clone(), *at) {
                    warn!(error = %e, "rejected job transition");
                }
            }

            Event::JobContext { id, fragment } => {
                if let Some(job) = self.jobs.get_mut(id.as_str()) {
                    job.context.merge(fragment);
                }
            }

            Event::NodeRegistered { node } => {
                self.nodes.insert(node.id.as_str().to_string(), node.clone());
            }

            Event::NodeHeartbeat { id, at } => {
                if let Some(node) = self.nodes.get_mut(id.as_str()) {
                    node.last_heard = *at;
                    node.state = NodeState::Active;
                }
            }

            Event::NodeLost { id } => {
                if let Some(node) = self.nodes.get_mut(id.as_str()) {
                    node.state = NodeState::Inactive;
                }
            }

            Event::InstanceCreated { instance } => {
                self.instances
                    .insert(instance.id.as_str().to_string(), instance.clone());
            }

            Event::InstanceStateChanged { id, state } => {
                if let Some(instance) = self.instances.get_mut(id.as_str()) {
                    instance.state = *state;
                }
            }

            // Inputs handled by the runtime, not store writes
            Event::JobResult { .. }
            | Event::JobAbort { .. }
            | Event::DispatchUnreachable { .. }
            | Event::TimerFired { .. }
            | Event::Shutdown
            | Event::Custom => {}
        }
    }

    pub fn job(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    /// Look up a job by full id or unique prefix.
    pub fn job_by_prefix(&self, prefix: &str) -> Option<&JobRecord> {
        if let Some(job) = self.jobs.get(prefix) {
            return Some(job);
        }
        let mut matches = self.jobs.values().filter(|j| j.id.as_str().starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(job), None) => Some(job),
            _ => None,
        }
    }

    /// Direct children of a job, in creation order.
    pub fn children_of(&self, id: &str) -> Vec<&JobRecord> {
        self.children
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.jobs.get(id.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every job of a tree, in creation order (root first).
    pub fn tree_of(&self, root: &str) -> Vec<&JobRecord> {
        self.members
            .get(root)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.jobs.get(id.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All root jobs.
    pub fn roots(&self) -> Vec<&JobRecord> {
        self.jobs.values().filter(|j| j.is_root()).collect()
    }

    /// Ids of the subtree rooted at `id` (excluding `id` itself), depth first.
    ///
    /// Edges are supposed to be acyclic; a corrupt cycle is reported and
    /// the walk stops rather than spinning.
    pub fn descendants_of(&self, id: &str) -> Vec<JobId> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut stack: Vec<JobId> =
            self.children.get(id).cloned().unwrap_or_default();
        while let Some(next) = stack.pop() {
            if !seen.insert(next.as_str().to_string()) {
                warn!(id = %next, "cycle detected in job tree edges");
                continue;
            }
            if let Some(grandchildren) = self.children.get(next.as_str()) {
                stack.extend(grandchildren.iter().cloned());
            }
            out.push(next);
        }
        out
    }

    /// Ancestor chain from `id`'s parent up to the root.
    pub fn ancestors_of(&self, id: &str) -> Vec<JobId> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut current = self.jobs.get(id).and_then(|j| j.parent.clone());
        while let Some(parent_id) = current {
            if !seen.insert(parent_id.as_str().to_string()) {
                warn!(id = %parent_id, "cycle detected in job parent chain");
                break;
            }
            current = self
                .jobs
                .get(parent_id.as_str())
                .and_then(|j| j.parent.clone());
            out.push(parent_id);
        }
        out
    }

    /// Whether every child of `id` has reached `Success`.
    pub fn children_all_succeeded(&self, id: &str) -> bool {
        self.children_of(id)
            .iter()
            .all(|child| child.state == JobState::Success)
    }

    /// Armed roots that are not yet terminal.
    pub fn live_armed_roots(&self) -> Vec<&JobRecord> {
        self.armed
            .iter()
            .filter_map(|root| self.jobs.get(root))
            .filter(|job| !job.is_terminal())
            .collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
