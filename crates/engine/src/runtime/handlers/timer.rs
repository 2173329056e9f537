// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer handlers: dispatch deadlines, retry backoffs, heartbeat scan.

use crate::runtime::Runtime;
use pulse_core::{Clock, Effect, Event, JobState, NodeState, TimerId};
use tracing::warn;

impl<C: Clock + 'static> Runtime<C> {
    pub(crate) fn on_timer_fired(&self, timer: &TimerId) -> Vec<Effect> {
        if let Some(job) = timer.job_suffix("deadline:") {
            return self.on_deadline(&job);
        }
        if let Some(job) = timer.job_suffix("retry:") {
            return self.on_retry(&job);
        }
        if timer == &TimerId::heartbeat_scan() {
            return self.on_heartbeat_scan();
        }
        warn!(timer = %timer, "unknown timer fired");
        Vec::new()
    }

    /// Deadline expiry forces the bookkeeping terminal regardless of
    /// body cooperation; a best-effort abort chases the work.
    fn on_deadline(&self, id: &pulse_core::JobId) -> Vec<Effect> {
        let running = {
            let state = self.state.lock();
            state
                .job(id.as_str())
                .map(|job| job.state == JobState::Running)
                .unwrap_or(false)
        };
        if !running {
            return Vec::new();
        }

        let (abort_requested, node) = {
            let dispatcher = self.dispatcher.lock();
            (
                dispatcher.is_abort_requested(id.as_str()),
                dispatcher.get(id.as_str()).and_then(|entry| entry.node.clone()),
            )
        };

        let state = if abort_requested {
            JobState::Aborted
        } else {
            JobState::Failed
        };
        warn!(id = %id, state = %state, "job deadline expired");

        let mut effects = vec![Effect::Emit {
            event: Event::JobStatus {
                id: id.clone(),
                state,
                summary: Some("timeout".into()),
                at: self.clock.epoch_ms(),
                log_offset: Some(self.log_pipe.offset(id.as_str())),
            },
        }];
        effects.push(match node {
            Some(node) => Effect::AbortRemote {
                id: id.clone(),
                node,
            },
            None => Effect::AbortLocal { id: id.clone() },
        });
        effects
    }

    /// Retry a dispatch whose node was unreachable.
    fn on_retry(&self, id: &pulse_core::JobId) -> Vec<Effect> {
        let node = {
            let dispatcher = self.dispatcher.lock();
            match dispatcher.get(id.as_str()) {
                Some(entry) if !entry.abort_requested => entry.node.clone(),
                _ => None,
            }
        };
        let running = {
            let state = self.state.lock();
            state
                .job(id.as_str())
                .map(|job| job.state == JobState::Running)
                .unwrap_or(false)
        };
        match (node, running) {
            (Some(node), true) => vec![Effect::DispatchRemote {
                id: id.clone(),
                node,
            }],
            _ => Vec::new(),
        }
    }

    /// Declare nodes lost when their heartbeat goes quiet, then re-arm.
    fn on_heartbeat_scan(&self) -> Vec<Effect> {
        let now_ms = self.clock.epoch_ms();
        let grace_ms = self.config.heartbeat_grace.as_millis() as u64;

        let lost: Vec<_> = {
            let state = self.state.lock();
            state
                .nodes
                .values()
                .filter(|node| node.id != self.config.node_id)
                .filter(|node| node.state == NodeState::Active)
                .filter(|node| node.last_heard + grace_ms < now_ms)
                .map(|node| node.id.clone())
                .collect()
        };

        let mut effects: Vec<Effect> = lost
            .into_iter()
            .map(|id| Effect::Emit {
                event: Event::NodeLost { id },
            })
            .collect();

        effects.push(Effect::SetTimer {
            id: TimerId::heartbeat_scan(),
            duration: self.config.heartbeat_grace / 2,
        });
        effects
    }
}
