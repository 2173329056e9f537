// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the pulse job manager.
//!
//! The daemon applies each WAL event to the materialized state and then
//! hands it to [`Runtime::handle_event`]; handlers consult the selector
//! and dispatcher and request effects, which the executor performs.
//! Events produced along the way are returned for WAL persistence and
//! re-enter the loop on the next iteration.

mod executor;
mod handlers;

use crate::dispatch::Dispatcher;
use crate::error::RuntimeError;
use crate::link::NodeLink;
use crate::log_pipe::LogPipe;
use crate::registry::{Adapters, BodyIdGen, CoordinatorHandle, Registry};
use crate::scheduler::Scheduler;
use crate::selector::DEFAULT_NODE_CAP;
use crate::status_bus::StatusBus;
use crate::trees::TreePlan;
use pulse_core::{Clock, Context, Effect, Event, JobError, JobId, JobSpec, JobState, NodeId};
use pulse_storage::MaterializedState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// This coordinator's node id (jobs without affinity run here)
    pub node_id: NodeId,
    /// Cluster hostname routing set keys are scoped by
    pub cluster_hostname: String,
    /// Per-node concurrency cap
    pub node_cap: usize,
    /// Grace window before a silent node is declared lost
    pub heartbeat_grace: Duration,
    /// Directory for per-job log files
    pub log_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(node_id: NodeId, cluster_hostname: String, log_dir: PathBuf) -> Self {
        Self {
            node_id,
            cluster_hostname,
            node_cap: DEFAULT_NODE_CAP,
            heartbeat_grace: Duration::from_secs(30),
            log_dir,
        }
    }
}

/// An outcome held back while a tree-extending body's late children run.
#[derive(Debug, Clone)]
pub(crate) struct PendingOutcome {
    pub summary: String,
    pub output: Context,
}

/// Runtime that coordinates the job manager.
pub struct Runtime<C: Clock> {
    pub(crate) registry: Registry,
    pub(crate) state: Arc<Mutex<MaterializedState>>,
    pub(crate) dispatcher: Mutex<Dispatcher>,
    pub(crate) scheduler: Arc<Mutex<Scheduler>>,
    pub(crate) status_bus: Arc<StatusBus>,
    pub(crate) log_pipe: Arc<LogPipe>,
    pub(crate) adapters: Arc<Adapters>,
    pub(crate) link: Arc<dyn NodeLink>,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
    pub(crate) event_tx: mpsc::Sender<Event>,
    pub(crate) ids: Arc<dyn BodyIdGen>,
    pub(crate) abort_tokens: Mutex<HashMap<String, CancellationToken>>,
    pub(crate) pending: Mutex<HashMap<String, PendingOutcome>>,
}

impl<C: Clock + 'static> Runtime<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Registry,
        state: Arc<Mutex<MaterializedState>>,
        adapters: Arc<Adapters>,
        link: Arc<dyn NodeLink>,
        clock: C,
        config: EngineConfig,
        event_tx: mpsc::Sender<Event>,
        ids: Arc<dyn BodyIdGen>,
    ) -> Self {
        Self {
            registry,
            state,
            dispatcher: Mutex::new(Dispatcher::new()),
            scheduler: Arc::new(Mutex::new(Scheduler::new())),
            status_bus: Arc::new(StatusBus::new()),
            log_pipe: Arc::new(LogPipe::new(config.log_dir.clone())),
            adapters,
            link,
            clock,
            config,
            event_tx,
            ids,
            abort_tokens: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn state(&self) -> Arc<Mutex<MaterializedState>> {
        Arc::clone(&self.state)
    }

    pub fn scheduler(&self) -> Arc<Mutex<Scheduler>> {
        Arc::clone(&self.scheduler)
    }

    pub fn status_bus(&self) -> Arc<StatusBus> {
        Arc::clone(&self.status_bus)
    }

    pub fn log_pipe(&self) -> Arc<LogPipe> {
        Arc::clone(&self.log_pipe)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ids(&self) -> Arc<dyn BodyIdGen> {
        Arc::clone(&self.ids)
    }

    pub(crate) fn coordinator_handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            state: Arc::clone(&self.state),
            event_tx: self.event_tx.clone(),
            cluster_hostname: self.config.cluster_hostname.clone(),
            ids: Arc::clone(&self.ids),
        }
    }

    /// Validate one spec against the registry and the store.
    fn validate_spec(
        &self,
        spec: &JobSpec,
        plan_members: &[JobId],
    ) -> Result<(), JobError> {
        self.registry.validate(&spec.body_type, &spec.parameters)?;
        if let Some(parent) = &spec.parent {
            if plan_members.contains(parent) {
                return Ok(());
            }
            let state = self.state.lock();
            let parent_job = state
                .job(parent.as_str())
                .ok_or_else(|| JobError::NotFound(parent.clone()))?;
            if parent_job.is_terminal() {
                return Err(JobError::ParentTerminal(parent.clone()));
            }
        }
        Ok(())
    }

    fn created_event(&self, spec: JobSpec, root: JobId) -> Event {
        Event::JobCreated {
            id: spec.id,
            root,
            parent: spec.parent,
            body_type: spec.body_type,
            parameters: spec.parameters,
            context: spec.context,
            node: spec.node,
            title: spec.title,
            created_at_ms: self.clock.epoch_ms(),
        }
    }

    /// Submit a whole tree. Jobs are validated before any event is
    /// emitted, so an invalid tree leaves no partial state behind.
    pub async fn submit_tree(&self, plan: TreePlan) -> Result<JobId, RuntimeError> {
        let member_ids: Vec<JobId> = plan.jobs.iter().map(|spec| spec.id.clone()).collect();
        for spec in &plan.jobs {
            self.validate_spec(spec, &member_ids)?;
        }
        for spec in plan.jobs {
            let event = self.created_event(spec, plan.root.clone());
            self.emit(event).await?;
        }
        Ok(plan.root)
    }

    /// Submit a single job (controller-created, or a body extending the
    /// tree beneath itself while running).
    pub async fn submit_job(&self, spec: JobSpec) -> Result<JobId, RuntimeError> {
        self.validate_spec(&spec, &[])?;
        let root = match &spec.parent {
            Some(parent) => {
                let state = self.state.lock();
                state
                    .job(parent.as_str())
                    .map(|job| job.root.clone())
                    .ok_or_else(|| JobError::NotFound(parent.clone()))?
            }
            None => spec.id.clone(),
        };
        let id = spec.id.clone();
        let event = self.created_event(spec, root);
        self.emit(event).await?;
        Ok(id)
    }

    /// Allow a root to execute. A second call is a no-op.
    pub async fn allow_execution(&self, root: &JobId) -> Result<(), RuntimeError> {
        self.emit(Event::JobArmed { root: root.clone() }).await
    }

    /// Request an abort of a job and its subtree.
    pub async fn abort(&self, id: &JobId) -> Result<(), RuntimeError> {
        self.emit(Event::JobAbort { id: id.clone() }).await
    }

    async fn emit(&self, event: Event) -> Result<(), RuntimeError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Arm the periodic heartbeat scan.
    pub fn start_heartbeat_scan(&self) {
        let period = self.config.heartbeat_grace / 2;
        self.scheduler.lock().set_timer(
            pulse_core::TimerId::heartbeat_scan().as_str().to_string(),
            period,
            self.clock.now(),
        );
    }

    /// Fail jobs left `running` by a previous process generation.
    ///
    /// Called once after snapshot + WAL replay, before new work starts:
    /// anything running has no live body or in-flight entry anymore.
    pub async fn reconcile_orphans(&self) -> Result<usize, RuntimeError> {
        let orphans: Vec<JobId> = {
            let state = self.state.lock();
            state
                .jobs
                .values()
                .filter(|job| job.state == JobState::Running)
                .map(|job| job.id.clone())
                .collect()
        };
        let count = orphans.len();
        for id in orphans {
            self.emit(Event::JobStatus {
                id,
                state: JobState::Failed,
                summary: Some("node_lost".into()),
                at: self.clock.epoch_ms(),
                log_offset: None,
            })
            .await?;
        }
        Ok(count)
    }

    /// Handle one event that has already been applied to the state.
    ///
    /// Returns the events produced while executing effects; the caller
    /// persists them to the WAL so they re-enter the loop exactly once.
    pub async fn handle_event(&self, event: &Event) -> Result<Vec<Event>, RuntimeError> {
        let effects = match event {
            Event::JobCreated { id, root, .. } => self.on_job_created(id, root),
            Event::JobArmed { root } => self.on_job_armed(root),
            Event::JobStatus {
                id, state, summary, ..
            } => self.on_job_status(id, *state, summary.clone()),
            Event::JobContext { .. } => Vec::new(),
            Event::JobResult {
                id,
                state,
                summary,
                output,
            } => self.on_job_result(id, *state, summary.clone(), output),
            Event::JobAbort { id } => self.on_job_abort(id),
            Event::DispatchUnreachable { id, node } => self.on_dispatch_unreachable(id, node),
            Event::NodeRegistered { .. } => self.select_and_dispatch(),
            Event::NodeHeartbeat { .. } => Vec::new(),
            Event::NodeLost { id } => self.on_node_lost(id),
            Event::TimerFired { id } => self.on_timer_fired(id),
            Event::InstanceCreated { .. }
            | Event::InstanceStateChanged { .. }
            | Event::Shutdown
            | Event::Custom => Vec::new(),
        };

        self.execute_all(effects).await
    }

    async fn execute_all(&self, effects: Vec<Effect>) -> Result<Vec<Event>, RuntimeError> {
        let mut produced = Vec::new();
        for effect in effects {
            if let Some(event) = self.execute(effect).await? {
                produced.push(event);
            }
        }
        Ok(produced)
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
