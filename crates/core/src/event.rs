// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event types for the pulse control plane.
//!
//! Events are the only write path into the store: they are appended to
//! the WAL before the engine processes them, and the materialized state
//! is rebuilt by replaying them. Serializes with
//! `{"type": "group:name", ...fields}` format. Unknown type tags
//! deserialize to `Custom`.

use crate::context::Context;
use crate::id::{InstanceId, JobId, NodeId};
use crate::instance::{InstanceRecord, InstanceState};
use crate::job::JobState;
use crate::node::Node;
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- job --
    #[serde(rename = "job:created")]
    JobCreated {
        id: JobId,
        root: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent: Option<JobId>,
        body_type: String,
        #[serde(default)]
        parameters: serde_json::Value,
        #[serde(default)]
        context: Context,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<NodeId>,
        title: String,
        #[serde(default)]
        created_at_ms: u64,
    },

    /// Root allowed to execute; every `new` member of the tree becomes
    /// `waiting`. Re-arming an armed root is a no-op.
    #[serde(rename = "job:armed")]
    JobArmed { root: JobId },

    /// Applied state transition (the authoritative store write).
    #[serde(rename = "job:status")]
    JobStatus {
        id: JobId,
        state: JobState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        at: u64,
        /// Tail of the job's log stream at transition time
        #[serde(default, skip_serializing_if = "Option::is_none")]
        log_offset: Option<u64>,
    },

    /// Context fragment merged into a job (finish-order serialized).
    #[serde(rename = "job:context")]
    JobContext { id: JobId, fragment: Context },

    /// Terminal outcome reported by a body or a remote node. Translated
    /// into `job:status`/`job:context` by the runtime; not applied
    /// directly to the store.
    #[serde(rename = "job:result")]
    JobResult {
        id: JobId,
        state: JobState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default)]
        output: Context,
    },

    /// Abort requested for a job (and its subtree).
    #[serde(rename = "job:abort")]
    JobAbort { id: JobId },

    // -- dispatch --
    /// A remote dispatch attempt could not reach its node.
    #[serde(rename = "dispatch:unreachable")]
    DispatchUnreachable { id: JobId, node: NodeId },

    // -- node --
    #[serde(rename = "node:registered")]
    NodeRegistered { node: Node },

    #[serde(rename = "node:heartbeat")]
    NodeHeartbeat { id: NodeId, at: u64 },

    /// Node missed its heartbeat grace window.
    #[serde(rename = "node:lost")]
    NodeLost { id: NodeId },

    // -- instance --
    #[serde(rename = "instance:created")]
    InstanceCreated { instance: InstanceRecord },

    #[serde(rename = "instance:state")]
    InstanceStateChanged { id: InstanceId, state: InstanceState },

    // -- timer --
    #[serde(rename = "timer:fired")]
    TimerFired { id: TimerId },

    // -- system --
    #[serde(rename = "system:shutdown")]
    Shutdown,

    /// Catch-all for unknown event types (extensibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    pub fn name(&self) -> &str {
        match self {
            Event::JobCreated { .. } => "job:created",
            Event::JobArmed { .. } => "job:armed",
            Event::JobStatus { .. } => "job:status",
            Event::JobContext { .. } => "job:context",
            Event::JobResult { .. } => "job:result",
            Event::JobAbort { .. } => "job:abort",
            Event::DispatchUnreachable { .. } => "dispatch:unreachable",
            Event::NodeRegistered { .. } => "node:registered",
            Event::NodeHeartbeat { .. } => "node:heartbeat",
            Event::NodeLost { .. } => "node:lost",
            Event::InstanceCreated { .. } => "instance:created",
            Event::InstanceStateChanged { .. } => "instance:state",
            Event::TimerFired { .. } => "timer:fired",
            Event::Shutdown => "system:shutdown",
            Event::Custom => "custom",
        }
    }

    pub fn log_summary(&self) -> String {
        let t = self.name();
        match self {
            Event::JobCreated {
                id,
                root,
                body_type,
                ..
            } => format!("{t} id={id} root={root} body={body_type}"),
            Event::JobArmed { root } => format!("{t} root={root}"),
            Event::JobStatus {
                id, state, summary, ..
            } => {
                if let Some(summary) = summary {
                    format!("{t} id={id} state={state} summary={summary}")
                } else {
                    format!("{t} id={id} state={state}")
                }
            }
            Event::JobContext { id, fragment } => {
                format!("{t} id={id} keys={}", fragment.len())
            }
            Event::JobResult { id, state, .. } => format!("{t} id={id} state={state}"),
            Event::JobAbort { id } => format!("{t} id={id}"),
            Event::DispatchUnreachable { id, node } => format!("{t} id={id} node={node}"),
            Event::NodeRegistered { node } => {
                format!("{t} id={} route={}:{}", node.id, node.route, node.port)
            }
            Event::NodeHeartbeat { id, .. } => format!("{t} id={id}"),
            Event::NodeLost { id } => format!("{t} id={id}"),
            Event::InstanceCreated { instance } => {
                format!("{t} id={} node={}", instance.id, instance.node)
            }
            Event::InstanceStateChanged { id, state } => {
                format!("{t} id={id} state={state}")
            }
            Event::TimerFired { id } => format!("{t} id={id}"),
            Event::Shutdown | Event::Custom => t.to_string(),
        }
    }

    /// Job this event belongs to, if any.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Event::JobCreated { id, .. }
            | Event::JobStatus { id, .. }
            | Event::JobContext { id, .. }
            | Event::JobResult { id, .. }
            | Event::JobAbort { id }
            | Event::DispatchUnreachable { id, .. } => Some(id),
            Event::JobArmed { root } => Some(root),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
