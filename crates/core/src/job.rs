// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job record and state machine.

use crate::context::Context;
use crate::error::JobError;
use crate::id::{JobId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a job in its tree.
///
/// Terminal states are never left once entered. `Running` is only
/// reachable once every child of the job has reached `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created but the tree has not been allowed to execute yet
    New,
    /// Eligible for selection once all children have succeeded
    Waiting,
    /// Dispatched to a node and executing
    Running,
    Success,
    Failed,
    Aborted,
}

impl JobState {
    /// Check if this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failed | JobState::Aborted)
    }

    /// Whether a transition from `self` to `to` is legal.
    ///
    /// Re-entering the same terminal state is not legal here; duplicate
    /// terminal reports are filtered upstream before reaching the store.
    pub fn can_transition(&self, to: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, to),
            (New, Waiting)
                | (New, Aborted)
                | (Waiting, Running)
                | (Waiting, Aborted)
                | (Running, Success)
                | (Running, Failed)
                | (Running, Aborted)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::New => write!(f, "new"),
            JobState::Waiting => write!(f, "waiting"),
            JobState::Running => write!(f, "running"),
            JobState::Success => write!(f, "success"),
            JobState::Failed => write!(f, "failed"),
            JobState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Inputs for creating a new job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    pub body_type: String,
    pub title: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Parent job; `None` makes this job the root of a new tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<JobId>,
    /// Target node; `None` runs the body on the coordinator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// Initial context for the tree (roots only; ignored for children).
    #[serde(default)]
    pub context: Context,
}

/// A single job in a tree.
///
/// Records are owned by the store; edges are held by id only and tree
/// traversal always goes through the store's indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Root of the tree this job belongs to (== `id` for roots)
    pub root: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<JobId>,
    /// Interned body name, e.g. `pulse.job.heart.startup`
    pub body_type: String,
    /// Immutable input bag, validated against the body's schema at insert
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Accumulated output of succeeded descendants, visible at dispatch
    #[serde(default)]
    pub context: Context,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub state: JobState,
    pub time_created: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_started: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_finished: Option<u64>,
    /// Tail offset of the job's log stream (monotone nondecreasing)
    #[serde(default)]
    pub log_offset_end: u64,
}

impl JobRecord {
    /// Build a record from a spec. The root is resolved by the caller
    /// (the store knows the parent's root; we only know the parent id).
    pub fn from_spec(spec: JobSpec, root: JobId, time_created: u64) -> Self {
        Self {
            root,
            parent: spec.parent,
            body_type: spec.body_type,
            parameters: spec.parameters,
            context: spec.context,
            node: spec.node,
            title: spec.title,
            summary: None,
            state: JobState::New,
            time_created,
            time_started: None,
            time_finished: None,
            log_offset_end: 0,
            id: spec.id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply a state transition, stamping timestamps.
    ///
    /// Returns `IllegalTransition` when the move is not in the legal
    /// table. A repeat of the current terminal state is also rejected
    /// here; callers that tolerate duplicate delivery filter first.
    pub fn transition(
        &mut self,
        to: JobState,
        summary: Option<String>,
        at: u64,
    ) -> Result<(), JobError> {
        if !self.state.can_transition(to) {
            return Err(JobError::IllegalTransition {
                id: self.id.clone(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        if let Some(summary) = summary {
            self.summary = Some(summary);
        }
        match to {
            JobState::Running => self.time_started = Some(at),
            _ if to.is_terminal() => self.time_finished = Some(at),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
