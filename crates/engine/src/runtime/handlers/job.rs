// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job lifecycle handlers: creation, arming, transitions, results,
//! aborts, and the selection pass that follows them.

use crate::abort::cascade;
use crate::runtime::{PendingOutcome, Runtime};
use crate::selector::select_runnable;
use pulse_core::{
    Clock, Context, Effect, Event, InstanceId, InstanceState, JobId, JobState, NodeId, TimerId,
};
use tracing::{info, warn};

impl<C: Clock + 'static> Runtime<C> {
    /// Selection pass: dispatch every runnable job within the caps.
    pub(crate) fn select_and_dispatch(&self) -> Vec<Effect> {
        let at = self.clock.epoch_ms();
        let now = self.clock.now();
        let mut effects = Vec::new();

        let state = self.state.lock();
        let mut dispatcher = self.dispatcher.lock();
        let selected = select_runnable(
            &state,
            &dispatcher,
            &self.config.node_id,
            self.config.node_cap,
        );

        for id in selected {
            let Some(job) = state.job(id.as_str()) else {
                continue;
            };
            // The coordinator's own id means local execution
            let remote = job
                .node
                .clone()
                .filter(|node| node != &self.config.node_id);
            let timeout = self.registry.timeout(&job.body_type);

            if !dispatcher.begin(&id, remote.clone(), now, timeout) {
                continue;
            }

            effects.push(Effect::Emit {
                event: Event::JobStatus {
                    id: id.clone(),
                    state: JobState::Running,
                    summary: None,
                    at,
                    log_offset: None,
                },
            });
            effects.push(Effect::SetTimer {
                id: TimerId::deadline(&id),
                duration: timeout,
            });
            effects.push(match remote {
                Some(node) => Effect::DispatchRemote { id, node },
                None => Effect::DispatchLocal { id },
            });
        }

        effects
    }

    pub(crate) fn on_job_created(&self, id: &JobId, root: &JobId) -> Vec<Effect> {
        {
            let state = self.state.lock();
            let tree: Vec<_> = state.tree_of(root.as_str()).into_iter().cloned().collect();
            self.status_bus.publish_new_job(id, root, tree);
        }
        // A job added under an armed root (tree extension) is already
        // waiting and may be runnable at once.
        self.select_and_dispatch()
    }

    pub(crate) fn on_job_armed(&self, root: &JobId) -> Vec<Effect> {
        {
            let state = self.state.lock();
            let tree: Vec<_> = state.tree_of(root.as_str()).into_iter().cloned().collect();
            self.status_bus.publish_tree(root, tree);
        }
        self.select_and_dispatch()
    }

    pub(crate) fn on_job_status(
        &self,
        id: &JobId,
        state: JobState,
        summary: Option<String>,
    ) -> Vec<Effect> {
        let (root, parent) = {
            let store = self.state.lock();
            match store.job(id.as_str()) {
                Some(job) => (job.root.clone(), job.parent.clone()),
                None => return Vec::new(),
            }
        };

        self.status_bus
            .publish_status(id, &root, state, summary, self.clock.epoch_ms());

        if !state.is_terminal() {
            return Vec::new();
        }

        let mut effects = vec![
            Effect::CancelTimer {
                id: TimerId::deadline(id),
            },
            Effect::CancelTimer {
                id: TimerId::retry(id),
            },
        ];

        self.dispatcher.lock().complete(id.as_str());
        self.abort_tokens.lock().remove(id.as_str());
        self.pending.lock().remove(id.as_str());

        match state {
            JobState::Failed | JobState::Aborted => {
                effects.extend(self.cascade_effects(id));
            }
            JobState::Success => {
                // A parent holding back its outcome may be complete now
                if let Some(parent) = parent {
                    effects.extend(self.release_pending(&parent));
                }
            }
            _ => {}
        }

        effects.extend(self.select_and_dispatch());
        effects
    }

    /// Re-inject a deferred outcome once every child has succeeded.
    fn release_pending(&self, parent: &JobId) -> Vec<Effect> {
        let ready = {
            let state = self.state.lock();
            state.children_all_succeeded(parent.as_str())
                && self.pending.lock().contains_key(parent.as_str())
        };
        if !ready {
            return Vec::new();
        }
        let Some(outcome) = self.pending.lock().remove(parent.as_str()) else {
            return Vec::new();
        };
        vec![Effect::Emit {
            event: Event::JobResult {
                id: parent.clone(),
                state: JobState::Success,
                summary: Some(outcome.summary),
                output: outcome.output,
            },
        }]
    }

    /// Abort closure for a failed/aborted job.
    fn cascade_effects(&self, id: &JobId) -> Vec<Effect> {
        let plan = {
            let state = self.state.lock();
            cascade(&state, id.as_str())
        };
        let at = self.clock.epoch_ms();
        let mut effects = Vec::new();

        {
            let mut dispatcher = self.dispatcher.lock();
            for (job, _) in &plan.cooperative {
                dispatcher.mark_abort_requested(job.as_str());
            }
        }

        for job in plan.aborted {
            effects.push(Effect::Emit {
                event: Event::JobStatus {
                    id: job,
                    state: JobState::Aborted,
                    summary: None,
                    at,
                    log_offset: None,
                },
            });
        }
        for (job, node) in plan.cooperative {
            let remote = node.filter(|node| node != &self.config.node_id);
            effects.push(match remote {
                Some(node) => Effect::AbortRemote { id: job, node },
                None => Effect::AbortLocal { id: job },
            });
        }
        effects
    }

    pub(crate) fn on_job_result(
        &self,
        id: &JobId,
        reported: JobState,
        summary: Option<String>,
        output: &Context,
    ) -> Vec<Effect> {
        let job = {
            let state = self.state.lock();
            state.job(id.as_str()).cloned()
        };
        let Some(job) = job else {
            warn!(id = %id, "result for unknown job");
            return Vec::new();
        };

        // Late result after a forced transition (timeout, abort, node
        // loss): the bookkeeping already settled.
        if job.is_terminal() {
            if job.state == reported {
                info!(id = %id, state = %reported, "duplicate result delivery ignored");
            } else if reported == JobState::Success {
                info!(id = %id, "late success discarded; job already {}", job.state);
            } else {
                warn!(id = %id, reported = %reported, "late result for settled job");
            }
            return Vec::new();
        }
        if job.state != JobState::Running {
            warn!(id = %id, state = %job.state, "result for job that never ran");
            return Vec::new();
        }

        // An abort was requested; whatever the body says, it aborted.
        let abort_requested = self.dispatcher.lock().is_abort_requested(id.as_str());
        let state = if abort_requested {
            if reported == JobState::Success {
                info!(id = %id, "success after abort request discarded");
            }
            JobState::Aborted
        } else {
            reported
        };

        let at = self.clock.epoch_ms();
        let log_offset = Some(self.log_pipe.offset(id.as_str()));
        let mut effects = Vec::new();

        if state == JobState::Success {
            // Propagate output to the parent before it can run
            if let Some(parent) = &job.parent {
                if !output.is_empty() {
                    effects.push(Effect::Emit {
                        event: Event::JobContext {
                            id: parent.clone(),
                            fragment: output.clone(),
                        },
                    });
                }
            }
            effects.extend(self.instance_state_effects(output));

            // Tree extension: hold the outcome until late children finish
            let children_done = {
                let store = self.state.lock();
                store.children_all_succeeded(id.as_str())
            };
            if !children_done {
                self.pending.lock().insert(
                    id.as_str().to_string(),
                    PendingOutcome {
                        summary: summary.unwrap_or_default(),
                        output: output.clone(),
                    },
                );
                return effects;
            }
        }

        effects.push(Effect::Emit {
            event: Event::JobStatus {
                id: id.clone(),
                state,
                summary,
                at,
                log_offset,
            },
        });
        effects
    }

    /// Instance transitions driven by a success output's `instances` map.
    fn instance_state_effects(&self, output: &Context) -> Vec<Effect> {
        let Some(map) = output.get(pulse_core::KEY_INSTANCES).and_then(|v| v.as_object())
        else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        for (instance_id, value) in map {
            let Some(state) = value
                .as_str()
                .and_then(|s| serde_json::from_value::<InstanceState>(serde_json::json!(s)).ok())
            else {
                continue;
            };
            // Registered rows are created by select_locations itself
            if state == InstanceState::Registered {
                continue;
            }
            effects.push(Effect::Emit {
                event: Event::InstanceStateChanged {
                    id: InstanceId::new(instance_id.clone()),
                    state,
                },
            });
        }
        effects
    }

    pub(crate) fn on_job_abort(&self, id: &JobId) -> Vec<Effect> {
        let exists = {
            let state = self.state.lock();
            state.job(id.as_str()).is_some()
        };
        if !exists {
            warn!(id = %id, "abort for unknown job");
            return Vec::new();
        }
        info!(id = %id, "abort requested");
        self.cascade_effects(id)
    }

    pub(crate) fn on_dispatch_unreachable(&self, id: &JobId, node: &NodeId) -> Vec<Effect> {
        let attempt = self.dispatcher.lock().record_unreachable(id.as_str());
        if attempt == 0 {
            // Already settled (timed out or aborted while retrying)
            return Vec::new();
        }

        let retries_done = attempt.saturating_sub(1);
        if retries_done > crate::dispatch::MAX_DISPATCH_ATTEMPTS {
            warn!(id = %id, node = %node, "dispatch retries exhausted");
            return vec![Effect::Emit {
                event: Event::JobStatus {
                    id: id.clone(),
                    state: JobState::Failed,
                    summary: Some("dispatch_failed".into()),
                    at: self.clock.epoch_ms(),
                    log_offset: None,
                },
            }];
        }

        let backoff = crate::dispatch::Dispatcher::backoff(retries_done);
        info!(id = %id, node = %node, attempt, backoff_s = backoff.as_secs(), "dispatch unreachable, backing off");
        vec![Effect::SetTimer {
            id: TimerId::retry(id),
            duration: backoff,
        }]
    }
}
