// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios: an in-process pacemaker with fake adapters
//! drives the full coordinate trees the way the daemon loop does.

use parking_lot::Mutex;
use pulse_adapters::{DefaultPlacement, FakeRuntime, MemoryRoutingTable, RoutingTable};
use pulse_core::{
    Clock, Event, FakeClock, InstanceState, JobId, JobState, Node, NodeId, NodeRole, NodeState,
    SequentialIdGen,
};
use pulse_engine::{bodies, trees, Adapters, EngineConfig, FakeNodeLink, Runtime, TypeDescriptor};
use pulse_storage::MaterializedState;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// In-process pacemaker: runtime, store, fakes, and the event pump.
struct Cluster {
    runtime: Arc<Runtime<FakeClock>>,
    state: Arc<Mutex<MaterializedState>>,
    fake_runtime: FakeRuntime,
    routing: MemoryRoutingTable,
    clock: FakeClock,
    event_rx: mpsc::Receiver<Event>,
    _log_dir: tempfile::TempDir,
}

impl Cluster {
    fn new() -> Self {
        let fake_runtime = FakeRuntime::new();
        let routing = MemoryRoutingTable::new();
        let adapters = Arc::new(Adapters {
            runtime: Arc::new(fake_runtime.clone()),
            routing: Arc::new(routing.clone()),
            placement: Arc::new(DefaultPlacement),
        });

        let clock = FakeClock::new();
        let state = Arc::new(Mutex::new(MaterializedState::default()));
        let (event_tx, event_rx) = mpsc::channel(256);
        let log_dir = tempfile::tempdir().expect("tempdir");

        let config = EngineConfig::new(
            NodeId::new("n-1"),
            "local.cluster".into(),
            log_dir.path().to_path_buf(),
        );

        let runtime = Arc::new(Runtime::new(
            bodies::coordinator_registry(),
            Arc::clone(&state),
            adapters,
            Arc::new(FakeNodeLink::new()),
            clock.clone(),
            config,
            event_tx,
            Arc::new(SequentialIdGen::new("inst")),
        ));

        Self {
            runtime,
            state,
            fake_runtime,
            routing,
            clock,
            event_rx,
            _log_dir: log_dir,
        }
    }

    /// One heart node `n-1` (also the coordinator) advertising shell/1.
    async fn with_heart_node() -> Self {
        let mut cluster = Self::new();
        cluster
            .process(Event::NodeRegistered {
                node: Node {
                    id: NodeId::new("n-1"),
                    route: "10.0.0.1".into(),
                    port: 42500,
                    roles: vec![NodeRole::Pacemaker, NodeRole::Heart],
                    tags: json!({"runtimes": {"shell": ["1"]}}),
                    state: NodeState::Active,
                    last_heard: cluster.clock.epoch_ms(),
                },
            })
            .await;
        cluster
    }

    async fn process(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            self.state.lock().apply_event(&event);
            let produced = self
                .runtime
                .handle_event(&event)
                .await
                .expect("handle_event");
            queue.extend(produced);
        }
    }

    async fn drain(&mut self) {
        loop {
            match tokio::time::timeout(Duration::from_millis(100), self.event_rx.recv()).await {
                Ok(Some(event)) => self.process(event).await,
                _ => break,
            }
        }
    }

    async fn run_tree(&mut self, plan: trees::TreePlan) -> JobId {
        let root = self.runtime.submit_tree(plan).await.expect("submit");
        self.drain().await;
        self.runtime
            .allow_execution(&root)
            .await
            .expect("allow_execution");
        self.drain().await;
        root
    }

    fn job_state(&self, id: &JobId) -> JobState {
        self.state
            .lock()
            .job(id.as_str())
            .map(|job| job.state)
            .expect("job exists")
    }

    fn single_instance(&self) -> pulse_core::InstanceRecord {
        let state = self.state.lock();
        assert_eq!(state.instances.len(), 1, "expected exactly one instance");
        state.instances.values().next().cloned().expect("instance")
    }
}

fn descriptor() -> TypeDescriptor {
    TypeDescriptor {
        instance_type: "type-1".into(),
        runtime: "shell".into(),
        runtime_version: "1".into(),
        version: "1".into(),
        hostnames: vec!["foo.com".into()],
        launch_command: "python app.py --port=%(port)d".into(),
        count: 1,
    }
}

const ROUTING_KEY: &str = "instances_1.foo.com.local.cluster";

/// Scenario 1: register then start a single instance. One instance row
/// reaches `registered` with a port in [42600, 42699]; after startup it
/// is `running` and routed; both roots end `success`.
#[tokio::test]
async fn register_and_start_single_instance() {
    let mut cluster = Cluster::with_heart_node().await;

    let register_root = cluster
        .run_tree(trees::register_tree(
            cluster.runtime.ids().as_ref(),
            &descriptor(),
        ))
        .await;
    assert_eq!(cluster.job_state(&register_root), JobState::Success);

    let registered = cluster.single_instance();
    assert_eq!(registered.state, InstanceState::Registered);
    assert!((42600..=42699).contains(&registered.port));
    assert_eq!(registered.node, NodeId::new("n-1"));

    let startup_plan = {
        let state = cluster.state.lock();
        trees::startup_tree(&state, cluster.runtime.ids().as_ref(), "type-1")
    };
    let startup_root = cluster.run_tree(startup_plan).await;
    assert_eq!(cluster.job_state(&startup_root), JobState::Success);

    let running = cluster.single_instance();
    assert_eq!(running.state, InstanceState::Running);
    assert_eq!(
        cluster.fake_runtime.started(),
        vec![running.id.as_str().to_string()]
    );

    let members = cluster.routing.members(ROUTING_KEY).await.expect("members");
    assert_eq!(members, vec![format!("10.0.0.1:{}", running.port)]);
}

/// Scenario 2: stopping the instance clears its routing entry and the
/// instance ends `stopped`.
#[tokio::test]
async fn stop_a_running_instance() {
    let mut cluster = Cluster::with_heart_node().await;
    cluster
        .run_tree(trees::register_tree(
            cluster.runtime.ids().as_ref(),
            &descriptor(),
        ))
        .await;
    let startup_plan = {
        let state = cluster.state.lock();
        trees::startup_tree(&state, cluster.runtime.ids().as_ref(), "type-1")
    };
    cluster.run_tree(startup_plan).await;

    let shutdown_plan = {
        let state = cluster.state.lock();
        trees::shutdown_tree(&state, cluster.runtime.ids().as_ref(), "type-1")
    };
    let shutdown_root = cluster.run_tree(shutdown_plan).await;
    assert_eq!(cluster.job_state(&shutdown_root), JobState::Success);

    let stopped = cluster.single_instance();
    assert_eq!(stopped.state, InstanceState::Stopped);
    assert_eq!(
        cluster.fake_runtime.stopped(),
        vec![stopped.id.as_str().to_string()]
    );
    assert!(cluster
        .routing
        .members(ROUTING_KEY)
        .await
        .expect("members")
        .is_empty());
}

/// Scenario 3: the heart hangs between pre-startup and startup. The
/// startup job fails on its deadline, ancestors abort, and the routing
/// table is left for a compensating shutdown (nothing was added here
/// because routing waits on startup).
#[tokio::test]
async fn heart_hanging_mid_start_fails_the_tree() {
    let mut cluster = Cluster::with_heart_node().await;
    cluster
        .run_tree(trees::register_tree(
            cluster.runtime.ids().as_ref(),
            &descriptor(),
        ))
        .await;

    cluster.fake_runtime.hang_start();
    let (startup_plan, startup_job, routing_job) = {
        let state = cluster.state.lock();
        let plan = trees::startup_tree(&state, cluster.runtime.ids().as_ref(), "type-1");
        let startup = plan.jobs[2].id.clone();
        let routing = plan.jobs[1].id.clone();
        (plan, startup, routing)
    };
    let root = cluster.run_tree(startup_plan).await;

    // pre_startup succeeded; startup is stuck
    assert_eq!(cluster.job_state(&startup_job), JobState::Running);

    cluster.clock.advance(Duration::from_secs(301));
    let fired = {
        let scheduler = cluster.runtime.scheduler();
        let mut scheduler = scheduler.lock();
        scheduler.fired_timers(cluster.clock.now())
    };
    for event in fired {
        cluster.process(event).await;
    }
    cluster.drain().await;

    assert_eq!(cluster.job_state(&startup_job), JobState::Failed);
    assert_eq!(cluster.job_state(&routing_job), JobState::Aborted);
    assert_eq!(cluster.job_state(&root), JobState::Aborted);

    // No compensating routing removal was scheduled automatically
    let instance = cluster.single_instance();
    assert_eq!(instance.state, InstanceState::Registered);
}

/// Scenario 4: abort while select_locations is pending leaves no
/// instance rows and the root aborted.
#[tokio::test]
async fn abort_during_registration_creates_no_instances() {
    let mut cluster = Cluster::with_heart_node().await;

    let plan = trees::register_tree(cluster.runtime.ids().as_ref(), &descriptor());
    let root = cluster.runtime.submit_tree(plan).await.expect("submit");
    cluster.drain().await;

    // Abort before the tree is ever armed: nothing may run afterwards
    cluster.runtime.abort(&root).await.expect("abort");
    cluster.drain().await;

    assert_eq!(cluster.job_state(&root), JobState::Aborted);
    assert!(cluster.state.lock().instances.is_empty());
}

/// Scenario 6 (API level): a late subscriber replays the whole log, a
/// resuming subscriber gets exactly the tail.
#[tokio::test]
async fn log_replay_and_resume() {
    let cluster = Cluster::new();
    let pipe = cluster.runtime.log_pipe();

    let mid = pipe.append_line("job-1", "head").expect("append");
    pipe.append_line("job-1", "tail").expect("append");

    let full = pipe.read_from("job-1", 0).expect("read");
    assert!(full.lines.contains("head") && full.lines.contains("tail"));

    let resumed = pipe.read_from("job-1", mid).expect("read");
    assert!(!resumed.lines.contains("head"));
    assert!(resumed.lines.contains("tail"));
    assert_eq!(resumed.offset, full.offset);
}
