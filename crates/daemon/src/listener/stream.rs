// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming facade: subscriptions over one framed connection.
//!
//! Client frames are `{request, sequence, data, auth?}`. The first
//! accepted auth authenticates the connection for its lifetime; every
//! failure is answered with an `error` frame echoing the sequence.
//! Server frames are the status bus shapes plus `lines` for log
//! subscriptions.

use super::{authorize, ListenCtx};
use crate::protocol::{self, ProtocolError, StreamRequest};
use pulse_core::JobId;
use pulse_engine::StatusFrame;
use std::collections::HashMap;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Run the streaming loop until the client hangs up.
pub(crate) async fn run(
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    ctx: &ListenCtx,
) -> Result<(), ProtocolError> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<StatusFrame>();

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if protocol::write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });

    let mut session = StreamSession {
        ctx,
        out_tx,
        authed: false,
        forwarders: HashMap::new(),
    };

    let result = loop {
        let bytes = match protocol::read_message(&mut reader).await {
            Ok(bytes) => bytes,
            Err(e) => break Err(e),
        };
        let request: StreamRequest = match protocol::decode(&bytes) {
            Ok(request) => request,
            Err(e) => {
                session.error(0, format!("bad frame: {e}"));
                debug!(error = %e, "undecodable stream frame");
                continue;
            }
        };
        session.handle(request);
    };

    for (_, task) in session.forwarders.drain() {
        task.abort();
    }
    writer_task.abort();

    match result {
        Err(ProtocolError::ConnectionClosed) => Ok(()),
        other => other,
    }
}

struct StreamSession<'a> {
    ctx: &'a ListenCtx,
    out_tx: mpsc::UnboundedSender<StatusFrame>,
    authed: bool,
    /// Forwarder tasks by subscription key
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl StreamSession<'_> {
    fn error(&self, sequence: u64, error: String) {
        let _ = self.out_tx.send(StatusFrame::Error { sequence, error });
    }

    fn handle(&mut self, request: StreamRequest) {
        // First accepted auth covers the rest of the connection
        if !self.authed {
            match &request.auth {
                Some(credentials) => match authorize(credentials, &self.ctx.auth) {
                    Ok(()) => self.authed = true,
                    Err(e) => {
                        self.error(request.sequence, e);
                        return;
                    }
                },
                None => {
                    self.error(request.sequence, "authentication required".into());
                    return;
                }
            }
        }

        match request.request.as_str() {
            "subscribe_job_status" => self.subscribe_status(&request),
            "unsubscribe_job_status" => self.unsubscribe(&request, "status"),
            "subscribe_log" => self.subscribe_log(&request),
            "unsubscribe_log" => self.unsubscribe(&request, "log"),
            other => self.error(request.sequence, format!("unknown request: {other}")),
        }
    }

    fn root_id(&self, request: &StreamRequest) -> Option<JobId> {
        request
            .data
            .get("root_id")
            .or_else(|| request.data.get("job_id"))
            .and_then(|v| v.as_str())
            .map(JobId::new)
    }

    fn subscribe_status(&mut self, request: &StreamRequest) {
        let Some(root) = self.root_id(request) else {
            self.error(request.sequence, "missing root_id".into());
            return;
        };

        // Snapshot first so reconnecting subscribers can rebuild
        {
            let state = self.ctx.runtime.state();
            let state = state.lock();
            let jobs: Vec<_> = state.tree_of(root.as_str()).into_iter().cloned().collect();
            let _ = self.out_tx.send(StatusFrame::Tree {
                root: root.clone(),
                jobs,
            });
        }

        let mut rx = self.ctx.runtime.status_bus().subscribe_root(&root);
        let out = self.out_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if out.send(frame).is_err() {
                    break;
                }
            }
        });
        if let Some(old) = self
            .forwarders
            .insert(format!("status:{root}"), task)
        {
            old.abort();
        }
    }

    fn subscribe_log(&mut self, request: &StreamRequest) {
        let Some(job) = request
            .data
            .get("job_id")
            .and_then(|v| v.as_str())
            .map(JobId::new)
        else {
            self.error(request.sequence, "missing job_id".into());
            return;
        };
        let position = request
            .data
            .get("position")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        let mut rx = self.ctx.runtime.log_pipe().subscribe(job.as_str(), position);
        let out = self.out_tx.clone();
        let id = job.clone();
        let task = tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                let frame = StatusFrame::Lines {
                    id: id.clone(),
                    lines: chunk.lines,
                    offset: chunk.offset,
                };
                if out.send(frame).is_err() {
                    break;
                }
            }
        });
        if let Some(old) = self.forwarders.insert(format!("log:{job}"), task) {
            old.abort();
        }
    }

    fn unsubscribe(&mut self, request: &StreamRequest, kind: &str) {
        let Some(id) = self.root_id(request) else {
            self.error(request.sequence, "missing id".into());
            return;
        };
        if let Some(task) = self.forwarders.remove(&format!("{kind}:{id}")) {
            task.abort();
        }
    }
}
