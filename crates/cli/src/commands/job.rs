// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pulse job` - job inspection and aborts.

use crate::client::DaemonClient;
use crate::output::print_json;
use anyhow::{bail, Result};
use clap::Subcommand;
use pulse_daemon::protocol::{Query, Request, Response};

#[derive(Subcommand)]
pub enum JobCommand {
    /// List all jobs
    List,
    /// Show one job by id or unique prefix
    Show { id: String },
    /// Show the whole tree a job belongs to
    Tree { id: String },
    /// Abort a job and its subtree
    Abort { id: String },
}

pub async fn run(command: JobCommand, client: &DaemonClient) -> Result<()> {
    match command {
        JobCommand::List => {
            let response = client
                .request(Request::Query {
                    query: Query::ListJobs,
                    auth: client.credentials(),
                })
                .await?;
            match response {
                Response::Jobs { jobs } => print_json(&jobs),
                other => bail!("unexpected response: {other:?}"),
            }
        }

        JobCommand::Show { id } => {
            let response = client
                .request(Request::Query {
                    query: Query::GetJob { id: id.clone() },
                    auth: client.credentials(),
                })
                .await?;
            match response {
                Response::Job { job: Some(job) } => print_json(&job),
                Response::Job { job: None } => bail!("job not found: {id}"),
                other => bail!("unexpected response: {other:?}"),
            }
        }

        JobCommand::Tree { id } => super::print_tree(client, &id).await,

        JobCommand::Abort { id } => {
            let response = client
                .request(Request::AbortJob {
                    id,
                    auth: client.credentials(),
                })
                .await?;
            match response {
                Response::Ok => {
                    eprintln!("abort requested");
                    Ok(())
                }
                other => bail!("unexpected response: {other:?}"),
            }
        }
    }
}
