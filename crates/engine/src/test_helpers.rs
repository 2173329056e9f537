// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for body and runtime tests.

use crate::log_pipe::LogPipe;
use crate::registry::{Adapters, BodyContext, CoordinatorHandle};
use pulse_adapters::{DefaultPlacement, FakeRuntime, MemoryRoutingTable};
use pulse_core::{Context, Event, JobId, SequentialIdGen};
use pulse_storage::MaterializedState;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a body test needs: fake adapters, a store, an event
/// channel playing the coordinator side.
pub(crate) struct BodyFixture {
    pub adapters: Arc<Adapters>,
    pub fake_runtime: FakeRuntime,
    pub routing: MemoryRoutingTable,
    pub state: Arc<Mutex<MaterializedState>>,
    pub event_tx: mpsc::Sender<Event>,
    pub event_rx: mpsc::Receiver<Event>,
    pub log_pipe: Arc<LogPipe>,
    _log_dir: tempfile::TempDir,
}

impl BodyFixture {
    pub fn new() -> Self {
        let fake_runtime = FakeRuntime::new();
        let routing = MemoryRoutingTable::new();
        let adapters = Arc::new(Adapters {
            runtime: Arc::new(fake_runtime.clone()),
            routing: Arc::new(routing.clone()),
            placement: Arc::new(DefaultPlacement),
        });
        let (event_tx, event_rx) = mpsc::channel(64);
        let log_dir = tempfile::tempdir().unwrap();
        let log_pipe = Arc::new(LogPipe::new(log_dir.path().to_path_buf()));

        Self {
            adapters,
            fake_runtime,
            routing,
            state: Arc::new(Mutex::new(MaterializedState::default())),
            event_tx,
            event_rx,
            log_pipe,
            _log_dir: log_dir,
        }
    }

    pub fn apply(&self, event: &Event) {
        self.state.lock().apply_event(event);
    }

    /// Coordinator-side body context.
    pub fn ctx(&self, job_id: &str, parameters: serde_json::Value, context: Context) -> BodyContext {
        BodyContext {
            job_id: JobId::new(job_id),
            parameters,
            context,
            logger: self.log_pipe.handle(&JobId::new(job_id)),
            abort: CancellationToken::new(),
            adapters: Arc::clone(&self.adapters),
            coordinator: Some(CoordinatorHandle {
                state: Arc::clone(&self.state),
                event_tx: self.event_tx.clone(),
                cluster_hostname: "local.cluster".into(),
                ids: Arc::new(SequentialIdGen::new("inst")),
            }),
        }
    }

    /// Heart-side body context (no coordinator handle).
    pub fn heart_ctx(&self, job_id: &str, parameters: serde_json::Value) -> BodyContext {
        BodyContext {
            job_id: JobId::new(job_id),
            parameters,
            context: Context::new(),
            logger: self.log_pipe.handle(&JobId::new(job_id)),
            abort: CancellationToken::new(),
            adapters: Arc::clone(&self.adapters),
            coordinator: None,
        }
    }

    /// Drain emitted events, applying each to the store.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            self.state.lock().apply_event(&event);
            events.push(event);
        }
        events
    }
}
