// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tests: the event loop driven end to end with fake adapters,
//! a fake clock, and a fake node link.

mod abort;
mod arming;
mod node_loss;
mod remote;
mod results;
mod timeout;

use crate::bodies::coordinator_registry;
use crate::link::FakeNodeLink;
use crate::registry::{Adapters, BodyContext, BodyOutcome, JobBody};
use crate::runtime::{EngineConfig, Runtime};
use crate::trees;
use async_trait::async_trait;
use pulse_adapters::{DefaultPlacement, FakeRuntime, MemoryRoutingTable};
use pulse_core::{
    Clock, Context, Event, FakeClock, JobId, JobSpec, JobState, NodeId, SequentialIdGen,
};
use pulse_storage::MaterializedState;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Succeeds with the object under `parameters.output` as its output.
struct EchoBody;

#[async_trait]
impl JobBody for EchoBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let output: Context = ctx
            .parameters
            .get("output")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        BodyOutcome::Success {
            output,
            summary: "echoed".into(),
        }
    }
}

/// Fails with `parameters.message`.
struct FailBody;

#[async_trait]
impl JobBody for FailBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let message = ctx
            .parameters
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("failed");
        BodyOutcome::failure(message)
    }
}

/// Runs until the abort token is cancelled.
struct HangBody;

#[async_trait]
impl JobBody for HangBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        ctx.abort.cancelled().await;
        BodyOutcome::aborted("aborted")
    }
}

pub(crate) struct Harness {
    pub runtime: Arc<Runtime<FakeClock>>,
    pub clock: FakeClock,
    pub state: Arc<Mutex<MaterializedState>>,
    pub fake_runtime: FakeRuntime,
    pub routing: MemoryRoutingTable,
    pub link: FakeNodeLink,
    event_rx: mpsc::Receiver<Event>,
    _log_dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let mut registry = coordinator_registry();
        registry.register::<serde_json::Value>("test.echo", Arc::new(EchoBody), None, false);
        registry.register::<serde_json::Value>("test.fail", Arc::new(FailBody), None, false);
        registry.register::<serde_json::Value>("test.hang", Arc::new(HangBody), None, false);

        let fake_runtime = FakeRuntime::new();
        let routing = MemoryRoutingTable::new();
        let link = FakeNodeLink::new();
        let adapters = Arc::new(Adapters {
            runtime: Arc::new(fake_runtime.clone()),
            routing: Arc::new(routing.clone()),
            placement: Arc::new(DefaultPlacement),
        });

        let clock = FakeClock::new();
        let state = Arc::new(Mutex::new(MaterializedState::default()));
        let (event_tx, event_rx) = mpsc::channel(256);
        let log_dir = tempfile::tempdir().unwrap();

        let config = EngineConfig::new(
            NodeId::new("coord"),
            "local.cluster".into(),
            log_dir.path().to_path_buf(),
        );

        let runtime = Arc::new(Runtime::new(
            registry,
            Arc::clone(&state),
            adapters,
            Arc::new(link.clone()),
            clock.clone(),
            config,
            event_tx,
            Arc::new(SequentialIdGen::new("inst")),
        ));

        Self {
            runtime,
            clock,
            state,
            fake_runtime,
            routing,
            link,
            event_rx,
            _log_dir: log_dir,
        }
    }

    /// Process one event the way the daemon loop does: apply, handle,
    /// then feed produced events back in FIFO order.
    pub async fn process(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            self.state.lock().apply_event(&event);
            let produced = self.runtime.handle_event(&event).await.unwrap();
            queue.extend(produced);
        }
    }

    /// Pump queued events (submits, body results) until quiet.
    pub async fn drain(&mut self) {
        loop {
            match tokio::time::timeout(Duration::from_millis(100), self.event_rx.recv()).await {
                Ok(Some(event)) => self.process(event).await,
                _ => break,
            }
        }
    }

    /// Fire due timers against the fake clock.
    pub async fn fire_timers(&mut self) {
        let events = {
            let scheduler = self.runtime.scheduler();
            let mut scheduler = scheduler.lock();
            scheduler.fired_timers(self.clock.now())
        };
        for event in events {
            self.process(event).await;
        }
        self.drain().await;
    }

    pub fn job_state(&self, id: &str) -> Option<JobState> {
        self.state.lock().job(id).map(|job| job.state)
    }

    pub fn job_summary(&self, id: &str) -> Option<String> {
        self.state.lock().job(id).and_then(|job| job.summary.clone())
    }

    /// Submit a one-off job with the given body and parameters.
    pub async fn submit(
        &mut self,
        id: &str,
        body_type: &str,
        parameters: serde_json::Value,
        parent: Option<&str>,
        node: Option<&str>,
    ) -> JobId {
        let spec = JobSpec {
            id: JobId::new(id),
            body_type: body_type.into(),
            title: id.into(),
            parameters,
            parent: parent.map(JobId::new),
            node: node.map(NodeId::new),
            context: Context::new(),
        };
        let id = self.runtime.submit_job(spec).await.unwrap();
        self.drain().await;
        id
    }

    pub async fn arm(&mut self, root: &JobId) {
        self.runtime.allow_execution(root).await.unwrap();
        self.drain().await;
    }
}

fn descriptor() -> trees::TypeDescriptor {
    trees::TypeDescriptor {
        instance_type: "type-1".into(),
        runtime: "shell".into(),
        runtime_version: "1".into(),
        version: "1".into(),
        hostnames: vec!["foo.com".into()],
        launch_command: "python app.py --port=%(port)d".into(),
        count: 1,
    }
}

#[tokio::test]
async fn submit_rejects_unknown_bodies() {
    let harness = Harness::new();
    let spec = JobSpec {
        id: JobId::new("j-1"),
        body_type: "pulse.job.nope".into(),
        title: "bad".into(),
        parameters: json!({}),
        parent: None,
        node: None,
        context: Context::new(),
    };
    let err = harness.runtime.submit_job(spec).await.unwrap_err();
    assert!(err.to_string().contains("unknown job body"));
}

#[tokio::test]
async fn submit_rejects_schema_violations() {
    let harness = Harness::new();
    let spec = JobSpec {
        id: JobId::new("j-1"),
        body_type: crate::bodies::names::ROUTING_UPDATE.into(),
        title: "bad".into(),
        parameters: json!({"instance_id": 42}),
        parent: None,
        node: None,
        context: Context::new(),
    };
    let err = harness.runtime.submit_job(spec).await.unwrap_err();
    assert!(err.to_string().contains("schema"));
}

#[tokio::test]
async fn submit_rejects_terminal_parents() {
    let mut harness = Harness::new();
    let root = harness.submit("root", "test.echo", json!({}), None, None).await;
    harness.arm(&root).await;
    assert_eq!(harness.job_state("root"), Some(JobState::Success));

    let spec = JobSpec {
        id: JobId::new("late"),
        body_type: "test.echo".into(),
        title: "late".into(),
        parameters: json!({}),
        parent: Some(root),
        node: None,
        context: Context::new(),
    };
    let err = harness.runtime.submit_job(spec).await.unwrap_err();
    assert!(err.to_string().contains("terminal"));
}
