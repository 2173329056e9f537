// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pulse log` - job log streams.

use crate::client::DaemonClient;
use anyhow::{bail, Result};
use clap::Subcommand;
use pulse_daemon::protocol::{Query, Request, Response};
use pulse_engine::StatusFrame;
use std::io::Write;

#[derive(Subcommand)]
pub enum LogCommand {
    /// Print or follow a job's log stream
    Stream {
        id: String,
        /// Byte offset to resume from
        #[arg(long, default_value_t = 0)]
        position: u64,
        /// Keep following new bytes until interrupted
        #[arg(long)]
        follow: bool,
    },
}

pub async fn run(command: LogCommand, client: &DaemonClient) -> Result<()> {
    match command {
        LogCommand::Stream {
            id,
            position,
            follow,
        } => {
            if !follow {
                let response = client
                    .request(Request::Query {
                        query: Query::GetLog {
                            id: id.clone(),
                            position,
                        },
                        auth: client.credentials(),
                    })
                    .await?;
                return match response {
                    Response::Log { content, .. } => {
                        print!("{content}");
                        std::io::stdout().flush()?;
                        Ok(())
                    }
                    other => bail!("unexpected response: {other:?}"),
                };
            }

            let mut stream = client.open_stream().await?;
            stream
                .send(
                    "subscribe_log",
                    serde_json::json!({"job_id": id, "position": position}),
                )
                .await?;
            loop {
                match stream.next_frame().await? {
                    StatusFrame::Lines { lines, .. } => {
                        print!("{lines}");
                        std::io::stdout().flush()?;
                    }
                    StatusFrame::Error { error, .. } => bail!("stream error: {error}"),
                    _ => {}
                }
            }
        }
    }
}
