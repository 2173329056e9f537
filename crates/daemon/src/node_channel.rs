// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node channel: the long-lived pacemaker <-> heart connection.
//!
//! Hearts dial in, authenticate with the node token, and stay
//! connected. The pacemaker pushes `start_job`/`abort_job` frames down;
//! hearts push heartbeats, log bytes, and terminal results back up.
//! The registry of live channels is the engine's `NodeLink`.

use crate::event_bus::EventBus;
use crate::protocol::{self, NodeFrame, ProtocolError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pulse_core::{Clock, Event, JobId, NodeId, NodeState, SystemClock};
use pulse_engine::{LogPipe, NodeLink, NodeLinkError, StartJob};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Live channels to connected nodes, keyed by node id.
#[derive(Default)]
pub struct ChannelRegistry {
    senders: Mutex<HashMap<String, mpsc::Sender<NodeFrame>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, node: &NodeId) -> Option<mpsc::Sender<NodeFrame>> {
        self.senders.lock().get(node.as_str()).cloned()
    }

    fn insert(&self, node: &NodeId, tx: mpsc::Sender<NodeFrame>) {
        self.senders.lock().insert(node.as_str().to_string(), tx);
    }

    /// Remove the channel only if it is still the one this connection
    /// registered; a reconnect may have replaced it already.
    fn remove_if(&self, node: &NodeId, tx: &mpsc::Sender<NodeFrame>) {
        let mut senders = self.senders.lock();
        if let Some(current) = senders.get(node.as_str()) {
            if current.same_channel(tx) {
                senders.remove(node.as_str());
            }
        }
    }

    pub fn connected(&self) -> Vec<NodeId> {
        self.senders.lock().keys().cloned().map(NodeId::new).collect()
    }

    async fn send(&self, node: &NodeId, frame: NodeFrame) -> Result<(), NodeLinkError> {
        let Some(tx) = self.sender(node) else {
            return Err(NodeLinkError::Unreachable(format!(
                "no channel to node {node}"
            )));
        };
        tx.send(frame)
            .await
            .map_err(|_| NodeLinkError::Unreachable(format!("channel to node {node} closed")))
    }
}

#[async_trait]
impl NodeLink for ChannelRegistry {
    async fn start_job(&self, node: &NodeId, start: StartJob) -> Result<(), NodeLinkError> {
        self.send(node, NodeFrame::StartJob { job: start }).await
    }

    async fn abort_job(&self, node: &NodeId, job: &JobId) -> Result<(), NodeLinkError> {
        self.send(node, NodeFrame::AbortJob { id: job.clone() }).await
    }
}

/// Shared context for serving node connections.
pub struct NodeChannelCtx {
    pub registry: Arc<ChannelRegistry>,
    pub event_bus: EventBus,
    pub log_pipe: Arc<LogPipe>,
    pub state: Arc<parking_lot::Mutex<pulse_storage::MaterializedState>>,
    pub coordinator: NodeId,
    pub node_token: Option<String>,
}

/// Accept loop for the node channel listener.
pub async fn serve(listener: TcpListener, ctx: Arc<NodeChannelCtx>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "node connection accepted");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    if let Err(e) = handle_node(stream, &ctx).await {
                        match e {
                            ProtocolError::ConnectionClosed => debug!("node disconnected"),
                            _ => warn!(error = %e, "node connection error"),
                        }
                    }
                });
            }
            Err(e) => error!(error = %e, "node channel accept error"),
        }
    }
}

async fn handle_node(stream: TcpStream, ctx: &NodeChannelCtx) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();

    // First frame must be Hello with a valid node token
    let hello: NodeFrame = protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT).await?;
    let NodeFrame::Hello { mut node, token } = hello else {
        warn!("node connection did not open with hello");
        return Ok(());
    };
    if let Some(expected) = &ctx.node_token {
        if &token != expected {
            warn!(node = %node.id, "node token rejected");
            return Ok(());
        }
    }

    // Re-registration of a live uuid must carry the same route; a
    // conflicting one is a duplicate node, not a reconnect
    {
        let state = ctx.state.lock();
        if let Some(existing) = state.nodes.get(node.id.as_str()) {
            if existing.state == NodeState::Active
                && ctx.registry.connected().contains(&node.id)
                && existing.route != node.route
            {
                let err = pulse_core::JobError::DuplicateNode(node.id.as_str().to_string());
                warn!(node = %node.id, route = %node.route, "{err}");
                return Ok(());
            }
        }
    }

    info!(node = %node.id, route = %node.route, "node connected");
    node.state = NodeState::Active;
    node.last_heard = SystemClock.epoch_ms();
    let node_id = node.id.clone();

    if ctx.event_bus.send(Event::NodeRegistered { node }).is_err() {
        return Ok(());
    }

    protocol::write_frame(&mut writer, &NodeFrame::HelloAck {
        coordinator: ctx.coordinator.clone(),
    })
    .await?;

    // Outbound half: frames queued by the engine's NodeLink
    let (tx, mut rx) = mpsc::channel::<NodeFrame>(64);
    ctx.registry.insert(&node_id, tx.clone());

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if protocol::write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });

    // Inbound half: heartbeats, logs, results
    let result = read_node_frames(&mut reader, ctx).await;

    ctx.registry.remove_if(&node_id, &tx);
    writer_task.abort();
    info!(node = %node_id, "node channel closed");
    result
}

async fn read_node_frames(
    reader: &mut (impl tokio::io::AsyncReadExt + Unpin),
    ctx: &NodeChannelCtx,
) -> Result<(), ProtocolError> {
    loop {
        let bytes = protocol::read_message(reader).await?;
        let frame: NodeFrame = protocol::decode(&bytes)?;
        match frame {
            NodeFrame::Heartbeat { id, at } => {
                let _ = ctx.event_bus.send(Event::NodeHeartbeat { id, at });
            }
            NodeFrame::JobResult {
                id,
                state,
                summary,
                output,
            } => {
                let _ = ctx.event_bus.send(Event::JobResult {
                    id,
                    state,
                    summary,
                    output,
                });
            }
            NodeFrame::JobLog { id, lines } => {
                if let Err(e) = ctx.log_pipe.append_raw(id.as_str(), &lines) {
                    warn!(job = %id, error = %e, "failed to append remote log bytes");
                }
            }
            other => {
                warn!(frame = ?other, "unexpected frame from node");
            }
        }
    }
}

#[cfg(test)]
#[path = "node_channel_tests.rs"]
mod tests;
