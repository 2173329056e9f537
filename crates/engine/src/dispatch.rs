// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher bookkeeping: in-flight jobs, deadlines, retries.
//!
//! The dispatcher never performs I/O; it is the table the runtime
//! consults when selecting, timing out, and retrying dispatches. One
//! entry exists per job from dispatch until its terminal transition.

use pulse_core::{JobId, NodeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Exponential backoff schedule for unreachable nodes.
const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(25),
];

/// Maximum dispatch attempts before the job fails with `dispatch_failed`.
pub const MAX_DISPATCH_ATTEMPTS: u32 = 3;

/// Bookkeeping for one dispatched job.
#[derive(Debug, Clone)]
pub struct InFlight {
    /// Effective target; `None` ran on the coordinator
    pub node: Option<NodeId>,
    pub deadline: Instant,
    /// Dispatch attempts so far (1 after the first send)
    pub attempt: u32,
    /// An abort was requested; any late result becomes `Aborted`
    pub abort_requested: bool,
}

/// In-flight dispatch table.
#[derive(Debug, Default)]
pub struct Dispatcher {
    in_flight: HashMap<String, InFlight>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a dispatch. Returns false if the job is already in flight
    /// (a duplicate selection that must not double-dispatch).
    pub fn begin(
        &mut self,
        id: &JobId,
        node: Option<NodeId>,
        now: Instant,
        timeout: Duration,
    ) -> bool {
        if self.in_flight.contains_key(id.as_str()) {
            return false;
        }
        self.in_flight.insert(
            id.as_str().to_string(),
            InFlight {
                node,
                deadline: now + timeout,
                attempt: 1,
                abort_requested: false,
            },
        );
        true
    }

    /// Remove a finished job. Returns its entry if it was in flight.
    pub fn complete(&mut self, id: &str) -> Option<InFlight> {
        self.in_flight.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&InFlight> {
        self.in_flight.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Count in-flight jobs on the given effective node key.
    pub fn count_for_node(&self, node: Option<&NodeId>) -> usize {
        self.in_flight
            .values()
            .filter(|entry| entry.node.as_ref() == node)
            .count()
    }

    /// Record a failed dispatch attempt; returns the new attempt count.
    pub fn record_unreachable(&mut self, id: &str) -> u32 {
        match self.in_flight.get_mut(id) {
            Some(entry) => {
                entry.attempt += 1;
                entry.attempt
            }
            None => 0,
        }
    }

    /// Backoff before retry `attempt` (1-indexed over completed sends).
    pub fn backoff(attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(RETRY_BACKOFF.len() - 1);
        RETRY_BACKOFF[index]
    }

    pub fn mark_abort_requested(&mut self, id: &str) {
        if let Some(entry) = self.in_flight.get_mut(id) {
            entry.abort_requested = true;
        }
    }

    pub fn is_abort_requested(&self, id: &str) -> bool {
        self.in_flight
            .get(id)
            .map(|entry| entry.abort_requested)
            .unwrap_or(false)
    }

    /// Jobs in flight on the given node (used when a node is lost).
    pub fn jobs_on_node(&self, node: &NodeId) -> Vec<JobId> {
        self.in_flight
            .iter()
            .filter(|(_, entry)| entry.node.as_ref() == Some(node))
            .map(|(id, _)| JobId::new(id.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
