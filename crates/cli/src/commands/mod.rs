// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands, grouped by noun.

pub mod job;
pub mod log;
pub mod node;
pub mod version;

use crate::client::DaemonClient;
use anyhow::Result;
use pulse_core::{JobId, JobState};
use pulse_daemon::protocol::{Query, Request, Response};
use pulse_engine::StatusFrame;

/// Follow a root's status frames until it reaches a terminal state.
///
/// Returns the terminal state of the root job.
pub(crate) async fn follow_root(client: &DaemonClient, root: &JobId) -> Result<JobState> {
    let mut stream = client.open_stream().await?;
    stream
        .send(
            "subscribe_job_status",
            serde_json::json!({"root_id": root.as_str()}),
        )
        .await?;

    loop {
        match stream.next_frame().await? {
            StatusFrame::Tree { jobs, .. } => {
                if let Some(job) = jobs.iter().find(|j| &j.id == root) {
                    if job.state.is_terminal() {
                        return Ok(job.state);
                    }
                }
            }
            StatusFrame::Status { id, state, summary, .. } => {
                if let Some(summary) = &summary {
                    eprintln!("{id}: {state} ({summary})");
                } else {
                    eprintln!("{id}: {state}");
                }
                if &id == root && state.is_terminal() {
                    return Ok(state);
                }
            }
            StatusFrame::Error { error, .. } => {
                anyhow::bail!("stream error: {error}");
            }
            _ => {}
        }
    }
}

/// Fetch a tree and print it as JSON.
pub(crate) async fn print_tree(client: &DaemonClient, root: &str) -> Result<()> {
    let response = client
        .request(Request::Query {
            query: Query::GetTree {
                root: root.to_string(),
            },
            auth: client.credentials(),
        })
        .await?;
    match response {
        Response::Tree { jobs } => crate::output::print_json(&jobs),
        other => anyhow::bail!("unexpected response: {other:?}"),
    }
}
