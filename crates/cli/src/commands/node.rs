// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pulse node` - cluster node inspection.

use crate::client::DaemonClient;
use crate::output::print_json;
use anyhow::{bail, Result};
use clap::Subcommand;
use pulse_daemon::protocol::{Query, Request, Response};

#[derive(Subcommand)]
pub enum NodeCommand {
    /// List registered nodes
    List,
}

pub async fn run(command: NodeCommand, client: &DaemonClient) -> Result<()> {
    match command {
        NodeCommand::List => {
            let response = client
                .request(Request::Query {
                    query: Query::ListNodes,
                    auth: client.credentials(),
                })
                .await?;
            match response {
                Response::Nodes { nodes } => print_json(&nodes),
                other => bail!("unexpected response: {other:?}"),
            }
        }
    }
}
