// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects the runtime asks the executor to perform

use crate::event::Event;
use crate::id::{JobId, NodeId};
use crate::timer::TimerId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Effects that need to be executed by the runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Emit an event into the system event bus
    Emit { event: Event },

    /// Start the job's body on this node
    DispatchLocal { id: JobId },

    /// Send a `start_job` frame to a remote node
    DispatchRemote { id: JobId, node: NodeId },

    /// Request cooperative cancellation of a locally running body
    AbortLocal { id: JobId },

    /// Best-effort `abort_job` frame to a remote node
    AbortRemote { id: JobId, node: NodeId },

    /// Set a timer
    SetTimer {
        id: TimerId,
        #[serde(with = "duration_serde")]
        duration: Duration,
    },

    /// Cancel a timer
    CancelTimer { id: TimerId },
}

impl Effect {
    /// Effect name for log spans (e.g., "dispatch_local")
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::DispatchLocal { .. } => "dispatch_local",
            Effect::DispatchRemote { .. } => "dispatch_remote",
            Effect::AbortLocal { .. } => "abort_local",
            Effect::AbortRemote { .. } => "abort_remote",
            Effect::SetTimer { .. } => "set_timer",
            Effect::CancelTimer { .. } => "cancel_timer",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::DispatchLocal { id } => vec![("job_id", id.to_string())],
            Effect::DispatchRemote { id, node } => vec![
                ("job_id", id.to_string()),
                ("node_id", node.to_string()),
            ],
            Effect::AbortLocal { id } => vec![("job_id", id.to_string())],
            Effect::AbortRemote { id, node } => vec![
                ("job_id", id.to_string()),
                ("node_id", node.to_string()),
            ],
            Effect::SetTimer { id, duration } => vec![
                ("timer_id", id.to_string()),
                ("duration_ms", duration.as_millis().to_string()),
            ],
            Effect::CancelTimer { id } => vec![("timer_id", id.to_string())],
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
