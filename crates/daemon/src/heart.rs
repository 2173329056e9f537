// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heart role: execute dispatched bodies and report back.
//!
//! The heart dials the pacemaker's node channel, authenticates with
//! the node token, heartbeats on a fixed period, and runs `start_job`
//! frames against its own registry. Log bytes stream back as they are
//! written; outcomes go back as `job_result`.

use crate::config::Config;
use crate::protocol::{self, NodeFrame, ProtocolError};
use parking_lot::Mutex;
use pulse_adapters::{DefaultPlacement, MemoryRoutingTable, ShellRuntime, TracedRuntime};
use pulse_core::{Clock, Context, JobState, Node, NodeId, NodeState, SystemClock};
use pulse_engine::{
    bodies::heart_registry, Adapters, BodyContext, BodyOutcome, LogPipe, Registry, StartJob,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Delay between reconnect attempts to the pacemaker.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum HeartError {
    #[error("heart role requires [heart].pacemaker_addr")]
    NoPacemakerAddr,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

struct HeartCtx {
    node: Node,
    token: String,
    registry: Registry,
    adapters: Arc<Adapters>,
    log_pipe: Arc<LogPipe>,
    heartbeat_period: Duration,
    /// Abort tokens of bodies currently running on this node
    running: Mutex<HashMap<String, CancellationToken>>,
}

/// Run the heart role until shutdown: connect, serve, reconnect.
pub async fn run(config: &Config, shutdown: Arc<Notify>) -> Result<(), HeartError> {
    let addr = config
        .heart
        .pacemaker_addr
        .clone()
        .ok_or(HeartError::NoPacemakerAddr)?;

    let node = Node {
        id: NodeId::new(config.resolve_node_uuid()?),
        route: config.node.route.clone(),
        port: config.node.port,
        roles: config.node.roles.clone(),
        tags: config.node.tags.clone(),
        state: NodeState::Active,
        last_heard: 0,
    };

    let ctx = Arc::new(HeartCtx {
        node,
        token: config.auth.node_token.clone().unwrap_or_default(),
        registry: heart_registry(),
        adapters: Arc::new(Adapters {
            runtime: Arc::new(TracedRuntime::new(ShellRuntime::new(
                config.instances_dir(),
            ))),
            // Routing stays on the coordinator; hearts never mutate it
            routing: Arc::new(MemoryRoutingTable::new()),
            placement: Arc::new(DefaultPlacement),
        }),
        log_pipe: Arc::new(LogPipe::new(config.log_dir())),
        heartbeat_period: Duration::from_secs(config.heart.heartbeat_period_secs),
        running: Mutex::new(HashMap::new()),
    });

    loop {
        tokio::select! {
            connected = TcpStream::connect(&addr) => {
                match connected {
                    Ok(stream) => {
                        info!(%addr, "connected to pacemaker");
                        if let Err(e) = session(stream, &ctx).await {
                            match e {
                                ProtocolError::ConnectionClosed => {
                                    warn!("pacemaker channel closed")
                                }
                                _ => warn!(error = %e, "pacemaker session error"),
                            }
                        }
                    }
                    Err(e) => warn!(%addr, error = %e, "pacemaker unreachable"),
                }
            }
            _ = shutdown.notified() => return Ok(()),
        }

        tokio::select! {
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            _ = shutdown.notified() => return Ok(()),
        }
    }
}

/// One connected session: hello, heartbeats, job frames.
async fn session(stream: TcpStream, ctx: &Arc<HeartCtx>) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();

    protocol::write_frame(
        &mut writer,
        &NodeFrame::Hello {
            node: ctx.node.clone(),
            token: ctx.token.clone(),
        },
    )
    .await?;

    let ack: NodeFrame = protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT).await?;
    let NodeFrame::HelloAck { coordinator } = ack else {
        warn!("pacemaker did not ack hello");
        return Ok(());
    };
    info!(coordinator = %coordinator, "registered with pacemaker");

    let (out_tx, mut out_rx) = mpsc::channel::<NodeFrame>(64);

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if protocol::write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });

    let heartbeat_tx = out_tx.clone();
    let node_id = ctx.node.id.clone();
    let period = ctx.heartbeat_period;
    let heartbeat_task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            let beat = NodeFrame::Heartbeat {
                id: node_id.clone(),
                at: SystemClock.epoch_ms(),
            };
            if heartbeat_tx.send(beat).await.is_err() {
                break;
            }
        }
    });

    let result = read_frames(&mut reader, ctx, &out_tx).await;

    heartbeat_task.abort();
    writer_task.abort();
    result
}

async fn read_frames(
    reader: &mut (impl tokio::io::AsyncReadExt + Unpin),
    ctx: &Arc<HeartCtx>,
    out_tx: &mpsc::Sender<NodeFrame>,
) -> Result<(), ProtocolError> {
    loop {
        let bytes = protocol::read_message(reader).await?;
        let frame: NodeFrame = protocol::decode(&bytes)?;
        match frame {
            NodeFrame::StartJob { job } => {
                start_body(ctx, out_tx, job);
            }
            NodeFrame::AbortJob { id } => {
                if let Some(token) = ctx.running.lock().get(id.as_str()) {
                    info!(job = %id, "abort requested by coordinator");
                    token.cancel();
                }
            }
            other => warn!(frame = ?other, "unexpected frame from pacemaker"),
        }
    }
}

/// Run one body as a detached task, streaming logs and the outcome.
fn start_body(ctx: &Arc<HeartCtx>, out_tx: &mpsc::Sender<NodeFrame>, job: StartJob) {
    // At-least-once delivery: a redelivered start for a body that is
    // still running must not spawn a second copy
    let token = CancellationToken::new();
    {
        let mut running = ctx.running.lock();
        if running.contains_key(job.id.as_str()) {
            warn!(job = %job.id, "duplicate start_job ignored");
            return;
        }
        running.insert(job.id.as_str().to_string(), token.clone());
    }

    let body = match ctx.registry.body(&job.body_type) {
        Ok(body) => body,
        Err(e) => {
            ctx.running.lock().remove(job.id.as_str());
            let out_tx = out_tx.clone();
            let id = job.id;
            let message = e.to_string();
            tokio::spawn(async move {
                let _ = out_tx
                    .send(NodeFrame::JobResult {
                        id,
                        state: JobState::Failed,
                        summary: Some(message),
                        output: Context::new(),
                    })
                    .await;
            });
            return;
        }
    };

    // Forward this job's log bytes upstream as they are appended
    let from_offset = ctx.log_pipe.offset(job.id.as_str());
    let mut log_rx = ctx.log_pipe.subscribe(job.id.as_str(), from_offset);
    let log_out = out_tx.clone();
    let log_id = job.id.clone();
    let log_task = tokio::spawn(async move {
        while let Some(chunk) = log_rx.recv().await {
            let frame = NodeFrame::JobLog {
                id: log_id.clone(),
                lines: chunk.lines,
            };
            if log_out.send(frame).await.is_err() {
                break;
            }
        }
    });

    let body_ctx = BodyContext {
        job_id: job.id.clone(),
        parameters: job.parameters,
        context: job.context,
        logger: ctx.log_pipe.handle(&job.id),
        abort: token,
        adapters: Arc::clone(&ctx.adapters),
        coordinator: None,
    };

    let ctx = Arc::clone(ctx);
    let out_tx = out_tx.clone();
    tokio::spawn(async move {
        let outcome = body.start(body_ctx).await;
        ctx.running.lock().remove(job.id.as_str());

        let frame = match outcome {
            BodyOutcome::Success { output, summary } => NodeFrame::JobResult {
                id: job.id,
                state: JobState::Success,
                summary: Some(summary),
                output,
            },
            BodyOutcome::Failure { summary } => NodeFrame::JobResult {
                id: job.id,
                state: JobState::Failed,
                summary: Some(summary),
                output: Context::new(),
            },
            BodyOutcome::Aborted { summary } => NodeFrame::JobResult {
                id: job.id,
                state: JobState::Aborted,
                summary: Some(summary),
                output: Context::new(),
            },
        };
        if out_tx.send(frame).await.is_err() {
            warn!("node channel closed before result delivery");
        }
        // Give the log forwarder a beat to drain, then stop it
        tokio::time::sleep(Duration::from_millis(50)).await;
        log_task.abort();
    });
}

#[cfg(test)]
#[path = "heart_tests.rs"]
mod tests;
