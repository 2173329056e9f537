// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pacemaker lifecycle: startup, the engine loop, shutdown, recovery.

use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use parking_lot::Mutex;
use pulse_adapters::{
    DefaultPlacement, MemoryRoutingTable, RedisRoutingTable, RoutingTable, ShellRuntime,
    TracedRouting, TracedRuntime,
};
use pulse_core::{Clock, Event, Node, NodeId, NodeState, SystemClock, UuidIdGen};
use pulse_engine::{bodies, Adapters, EngineConfig, Runtime};
use pulse_storage::{load_snapshot, Checkpointer, MaterializedState, Wal};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::config::Config;
use crate::event_bus::{spawn_event_forwarder, EventBus, EventReader};
use crate::listener::DaemonRuntime;
use crate::node_channel::{ChannelRegistry, NodeChannelCtx};

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] pulse_storage::WalError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] pulse_storage::SnapshotError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] pulse_storage::CheckpointError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Routing backend error: {0}")]
    Routing(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Pacemaker state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub state: Arc<Mutex<MaterializedState>>,
    pub runtime: Arc<DaemonRuntime>,
    pub event_bus: EventBus,
    pub start_time: Instant,
    checkpointer: Checkpointer,
}

/// Result of pacemaker startup.
pub struct StartupResult {
    pub daemon: DaemonState,
    /// Control/streaming listener, to be wrapped in a Listener task
    pub listener: TcpListener,
    /// Node channel listener plus its serving context
    pub node_listener: TcpListener,
    pub node_ctx: Arc<NodeChannelCtx>,
    /// Event reader for the engine loop
    pub event_reader: EventReader,
}

/// Start the pacemaker.
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Acquire the lock file first - prevents races with another pulsed.
    // Avoid truncating before the lock is held, which would wipe the
    // running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(config.lock_path())?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    // Load state from snapshot (if any) and replay the WAL tail
    let (mut state, processed_seq) = match load_snapshot(&config.snapshot_path())? {
        Some(snapshot) => {
            info!(
                seq = snapshot.seq,
                jobs = snapshot.state.jobs.len(),
                nodes = snapshot.state.nodes.len(),
                "loaded snapshot"
            );
            (snapshot.state, snapshot.seq)
        }
        None => {
            info!("no snapshot found, starting with empty state");
            (MaterializedState::default(), 0)
        }
    };

    let wal = Wal::open(&config.wal_path(), processed_seq)?;
    let events_to_replay = wal.entries_after(processed_seq)?;
    let replay_count = events_to_replay.len();
    let (event_bus, event_reader) = EventBus::new(wal);
    for entry in events_to_replay {
        state.apply_event(&entry.event);
    }
    if replay_count > 0 {
        info!(replay_count, processed_seq, "replayed WAL entries");
    }
    info!(
        jobs = state.jobs.len(),
        nodes = state.nodes.len(),
        instances = state.instances.len(),
        "recovered state"
    );

    let state = Arc::new(Mutex::new(state));

    // Adapters: shell runtime for locally hosted instances, redis (or
    // in-memory) routing, default placement, all traced
    let routing: Arc<dyn RoutingTable> = match &config.pacemaker.redis_url {
        Some(url) => Arc::new(TracedRouting::new(
            RedisRoutingTable::connect(url)
                .await
                .map_err(|e| LifecycleError::Routing(e.to_string()))?,
        )),
        None => {
            warn!("no redis_url configured; routing table is in-memory");
            Arc::new(TracedRouting::new(MemoryRoutingTable::new()))
        }
    };
    let adapters = Arc::new(Adapters {
        runtime: Arc::new(TracedRuntime::new(ShellRuntime::new(config.instances_dir()))),
        routing,
        placement: Arc::new(DefaultPlacement),
    });

    // Internal channel for the engine to emit events; forwarded to the
    // WAL-backed bus so engine-produced events are durable
    let (internal_tx, internal_rx) = mpsc::channel::<Event>(256);
    spawn_event_forwarder(internal_rx, event_bus.clone());

    let registry = bodies::coordinator_registry();
    let node_uuid = NodeId::new(config.resolve_node_uuid()?);
    let mut engine_config = EngineConfig::new(
        node_uuid.clone(),
        config.node.cluster_hostname.clone(),
        config.log_dir(),
    );
    engine_config.node_cap = config.pacemaker.node_cap;
    engine_config.heartbeat_grace = Duration::from_secs(config.pacemaker.heartbeat_grace_secs);

    let channels = Arc::new(ChannelRegistry::new());
    let runtime = Arc::new(Runtime::new(
        registry,
        Arc::clone(&state),
        adapters,
        channels.clone(),
        SystemClock,
        engine_config,
        internal_tx,
        Arc::new(UuidIdGen),
    ));

    // The pacemaker is a node too; register it so jobs can pin to it
    // (and so placement sees a co-hosted heart role)
    let self_node = Node {
        id: node_uuid.clone(),
        route: config.node.route.clone(),
        port: config.node.port,
        roles: config.node.roles.clone(),
        tags: config.node.tags.clone(),
        state: NodeState::Active,
        last_heard: SystemClock.epoch_ms(),
    };
    event_bus
        .send(Event::NodeRegistered { node: self_node })
        .map_err(LifecycleError::Wal)?;

    // Jobs left running by the previous process generation have no body
    // or in-flight entry anymore; fail them before new work starts
    let orphaned = runtime
        .reconcile_orphans()
        .await
        .map_err(|e| LifecycleError::Runtime(e.to_string()))?;
    if orphaned > 0 {
        warn!(orphaned, "failed jobs orphaned by restart");
    }

    runtime.start_heartbeat_scan();

    // Bind listeners last, after all validation passed
    let control_addr = format!("0.0.0.0:{}", config.node.port);
    let listener = TcpListener::bind(&control_addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(control_addr, e))?;

    let node_addr = format!("0.0.0.0:{}", config.pacemaker.node_port);
    let node_listener = TcpListener::bind(&node_addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(node_addr, e))?;

    let node_ctx = Arc::new(NodeChannelCtx {
        registry: channels,
        event_bus: event_bus.clone(),
        log_pipe: runtime.log_pipe(),
        state: Arc::clone(&state),
        coordinator: node_uuid,
        node_token: config.auth.node_token.clone(),
    });

    info!("pacemaker started");

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            state,
            runtime,
            event_bus,
            start_time: Instant::now(),
            checkpointer: Checkpointer::new(config.snapshot_path()),
        },
        listener,
        node_listener,
        node_ctx,
        event_reader,
    })
}

impl DaemonState {
    /// Process one WAL entry through the runtime.
    ///
    /// Result events are persisted to the WAL and will be processed by
    /// the engine loop on the next iteration, ensuring single delivery.
    pub async fn process_event(&self, event: &Event) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            state.apply_event(event);
        }

        let produced = self
            .runtime
            .handle_event(event)
            .await
            .map_err(|e| LifecycleError::Runtime(e.to_string()))?;

        for event in produced {
            if let Err(e) = self.event_bus.send(event) {
                warn!("failed to persist runtime result event to WAL: {}", e);
            }
        }
        Ok(())
    }

    /// Feed fired timers into the event bus.
    pub fn pump_timers(&self) {
        let fired = {
            let scheduler = self.runtime.scheduler();
            let mut scheduler = scheduler.lock();
            scheduler.fired_timers(self.runtime.clock().now())
        };
        for event in fired {
            if let Err(e) = self.event_bus.send(event) {
                warn!("failed to persist timer event: {}", e);
            }
        }
    }

    /// Periodic checkpoint: snapshot, then truncate the covered WAL.
    pub fn maybe_checkpoint(&mut self) -> Result<(), LifecycleError> {
        let processed = self.event_bus.processed_seq();
        if !self.checkpointer.is_due(processed) {
            return Ok(());
        }
        let state = self.state.lock().clone();
        let result = self.checkpointer.checkpoint_sync(processed, &state)?;
        self.event_bus.truncate_before(result.seq + 1)?;
        Ok(())
    }

    /// Shutdown gracefully: flush, final snapshot, release the lock.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("shutting down pacemaker...");

        if let Err(e) = self.event_bus.flush() {
            warn!("failed to flush WAL on shutdown: {}", e);
        }

        let processed_seq = self.event_bus.processed_seq();
        if processed_seq > 0 {
            let state = self.state.lock().clone();
            match self.checkpointer.checkpoint_sync(processed_seq, &state) {
                Ok(result) => info!(seq = result.seq, "saved final shutdown snapshot"),
                Err(e) => warn!("failed to save shutdown snapshot: {}", e),
            }
        }

        if self.config.lock_path().exists() {
            if let Err(e) = std::fs::remove_file(self.config.lock_path()) {
                warn!("failed to remove PID file: {}", e);
            }
        }

        info!("pacemaker shutdown complete");
        Ok(())
    }
}

/// Engine loop: WAL events, timers, flushes, checkpoints.
pub async fn run(
    mut daemon: DaemonState,
    mut event_reader: EventReader,
    shutdown: Arc<Notify>,
) -> Result<(), LifecycleError> {
    let mut tick = tokio::time::interval(Duration::from_millis(100));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            entry = event_reader.recv() => {
                match entry? {
                    Some(entry) => {
                        if entry.event == Event::Shutdown {
                            break;
                        }
                        daemon.process_event(&entry.event).await?;
                        event_reader.mark_processed(entry.seq);
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {
                daemon.pump_timers();
                if daemon.event_bus.needs_flush() {
                    if let Err(e) = daemon.event_bus.flush() {
                        warn!("periodic WAL flush failed: {}", e);
                    }
                }
                if let Err(e) = daemon.maybe_checkpoint() {
                    warn!("checkpoint failed: {}", e);
                }
            }
            _ = shutdown.notified() => break,
        }
    }

    daemon.shutdown()
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
