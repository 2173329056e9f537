// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node loss handling.

use crate::runtime::Runtime;
use pulse_core::{Clock, Effect, Event, JobState, NodeId};
use tracing::warn;

impl<C: Clock + 'static> Runtime<C> {
    /// A node missed its heartbeat grace window: everything in flight
    /// there fails with `node_lost`, and the status handler cascades
    /// the aborts through the affected trees.
    pub(crate) fn on_node_lost(&self, node: &NodeId) -> Vec<Effect> {
        let jobs = self.dispatcher.lock().jobs_on_node(node);
        if jobs.is_empty() {
            return Vec::new();
        }
        warn!(node = %node, count = jobs.len(), "failing in-flight jobs on lost node");

        let at = self.clock.epoch_ms();
        jobs.into_iter()
            .map(|id| Effect::Emit {
                event: Event::JobStatus {
                    id,
                    state: JobState::Failed,
                    summary: Some("node_lost".into()),
                    at,
                    log_offset: None,
                },
            })
            .collect()
    }
}
