// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor.
//!
//! Performs the side effects handlers request: applying emitted events,
//! starting bodies locally, sending frames to remote nodes, and timer
//! upkeep. Local bodies run as detached tasks and report back through
//! the event channel as `job:result`.

use crate::link::StartJob;
use crate::registry::{BodyContext, BodyOutcome};
use crate::runtime::Runtime;
use pulse_core::{Clock, Context, Effect, Event, JobId, JobState};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

impl<C: Clock + 'static> Runtime<C> {
    /// Execute a single effect with tracing.
    ///
    /// Returns an optional event to be persisted and fed back into the
    /// event loop.
    pub(crate) async fn execute(&self, effect: Effect) -> Result<Option<Event>, crate::RuntimeError> {
        let span = tracing::info_span!("effect", effect = effect.name());
        let _guard = span.enter();
        info!(fields = ?effect.fields(), "executing");

        match effect {
            Effect::Emit { event } => {
                // Apply immediately so later effects in this batch see it
                {
                    let mut state = self.state.lock();
                    state.apply_event(&event);
                }
                Ok(Some(event))
            }

            Effect::DispatchLocal { id } => {
                self.dispatch_local(&id);
                Ok(None)
            }

            Effect::DispatchRemote { id, node } => {
                let start = {
                    let state = self.state.lock();
                    state.job(id.as_str()).map(|job| StartJob {
                        id: job.id.clone(),
                        body_type: job.body_type.clone(),
                        parameters: job.parameters.clone(),
                        context: job.context.clone(),
                    })
                };
                let Some(start) = start else {
                    warn!(id = %id, "remote dispatch for unknown job");
                    return Ok(None);
                };
                match self.link.start_job(&node, start).await {
                    Ok(()) => Ok(None),
                    Err(e) => {
                        warn!(id = %id, node = %node, error = %e, "remote dispatch failed");
                        Ok(Some(Event::DispatchUnreachable { id, node }))
                    }
                }
            }

            Effect::AbortLocal { id } => {
                if let Some(token) = self.abort_tokens.lock().get(id.as_str()) {
                    token.cancel();
                }
                Ok(None)
            }

            Effect::AbortRemote { id, node } => {
                if let Err(e) = self.link.abort_job(&node, &id).await {
                    // Best-effort: the deadline will settle the books
                    warn!(id = %id, node = %node, error = %e, "abort frame not delivered");
                }
                Ok(None)
            }

            Effect::SetTimer { id, duration } => {
                let now = self.clock.now();
                self.scheduler
                    .lock()
                    .set_timer(id.as_str().to_string(), duration, now);
                Ok(None)
            }

            Effect::CancelTimer { id } => {
                self.scheduler.lock().cancel_timer(id.as_str());
                Ok(None)
            }
        }
    }

    /// Start a body on this node as a detached task.
    fn dispatch_local(&self, id: &JobId) {
        let job = {
            let state = self.state.lock();
            state.job(id.as_str()).cloned()
        };
        let Some(job) = job else {
            warn!(id = %id, "local dispatch for unknown job");
            return;
        };

        let body = match self.registry.body(&job.body_type) {
            Ok(body) => body,
            Err(e) => {
                // Creation validated the body type; only a registry
                // mismatch between nodes can get us here.
                error!(id = %id, error = %e, "no body for dispatched job");
                let event_tx = self.event_tx.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    let _ = event_tx
                        .send(Event::JobResult {
                            id,
                            state: JobState::Failed,
                            summary: Some(e.to_string()),
                            output: Context::new(),
                        })
                        .await;
                });
                return;
            }
        };

        let token = CancellationToken::new();
        self.abort_tokens
            .lock()
            .insert(id.as_str().to_string(), token.clone());

        let ctx = BodyContext {
            job_id: job.id.clone(),
            parameters: job.parameters.clone(),
            context: job.context.clone(),
            logger: self.log_pipe.handle(&job.id),
            abort: token,
            adapters: std::sync::Arc::clone(&self.adapters),
            coordinator: Some(self.coordinator_handle()),
        };

        let event_tx = self.event_tx.clone();
        let id = job.id;
        tokio::spawn(async move {
            let outcome = body.start(ctx).await;
            let event = match outcome {
                BodyOutcome::Success { output, summary } => Event::JobResult {
                    id,
                    state: JobState::Success,
                    summary: Some(summary),
                    output,
                },
                BodyOutcome::Failure { summary } => Event::JobResult {
                    id,
                    state: JobState::Failed,
                    summary: Some(summary),
                    output: Context::new(),
                },
                BodyOutcome::Aborted { summary } => Event::JobResult {
                    id,
                    state: JobState::Aborted,
                    summary: Some(summary),
                    output: Context::new(),
                },
            };
            if event_tx.send(event).await.is_err() {
                error!("event channel closed before body result delivery");
            }
        });
    }
}
