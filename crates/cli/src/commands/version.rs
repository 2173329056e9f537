// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pulse version` - application version lifecycle trees.
//!
//! Each verb submits the matching coordinate tree, arms it, and (with
//! `--follow`) tails the root to its terminal state.

use crate::client::DaemonClient;
use crate::output::print_json;
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use pulse_core::JobState;
use pulse_daemon::protocol::{Request, Response, TreeOp};
use pulse_engine::TypeDescriptor;

#[derive(Args)]
pub struct RegisterArgs {
    /// Instance type identifier
    pub instance_type: String,

    /// Runtime plugin name
    #[arg(long, default_value = "shell")]
    pub runtime: String,

    /// Runtime version
    #[arg(long, default_value = "1")]
    pub runtime_version: String,

    /// Version label used in routing keys
    #[arg(long, default_value = "1")]
    pub version: String,

    /// Hostname served by the router (repeatable)
    #[arg(long = "hostname", required = true)]
    pub hostnames: Vec<String>,

    /// Launch command; %(port)d is substituted
    #[arg(long)]
    pub launch_command: String,

    /// Number of instances to place
    #[arg(long, default_value_t = 1)]
    pub count: usize,

    /// Tail the tree until it finishes
    #[arg(long)]
    pub follow: bool,
}

#[derive(Args)]
pub struct LifecycleArgs {
    /// Instance type identifier
    pub instance_type: String,

    /// Tail the tree until it finishes
    #[arg(long)]
    pub follow: bool,
}

#[derive(Subcommand)]
pub enum VersionCommand {
    /// Place and register instances for an instance type
    Register(RegisterArgs),
    /// Start registered instances and add them to routing
    Start(LifecycleArgs),
    /// Remove routing and stop running instances
    Stop(LifecycleArgs),
    /// Deregister stopped instances
    Deregister(LifecycleArgs),
}

pub async fn run(command: VersionCommand, client: &DaemonClient) -> Result<()> {
    let (request, follow) = match command {
        VersionCommand::Register(args) => {
            let follow = args.follow;
            let descriptor = TypeDescriptor {
                instance_type: args.instance_type,
                runtime: args.runtime,
                runtime_version: args.runtime_version,
                version: args.version,
                hostnames: args.hostnames,
                launch_command: args.launch_command,
                count: args.count,
            };
            (
                Request::SubmitTree {
                    op: TreeOp::Register,
                    descriptor: Some(descriptor),
                    instance_type: None,
                    auth: client.credentials(),
                },
                follow,
            )
        }
        VersionCommand::Start(args) => (lifecycle_request(TreeOp::Startup, &args, client), args.follow),
        VersionCommand::Stop(args) => (lifecycle_request(TreeOp::Shutdown, &args, client), args.follow),
        VersionCommand::Deregister(args) => {
            (lifecycle_request(TreeOp::Deregister, &args, client), args.follow)
        }
    };

    submit_and_run(request, follow, client).await
}

fn lifecycle_request(op: TreeOp, args: &LifecycleArgs, client: &DaemonClient) -> Request {
    Request::SubmitTree {
        op,
        descriptor: None,
        instance_type: Some(args.instance_type.clone()),
        auth: client.credentials(),
    }
}

async fn submit_and_run(request: Request, follow: bool, client: &DaemonClient) -> Result<()> {
    let response = client.request(request).await?;
    let Response::TreeSubmitted { root } = response else {
        bail!("unexpected response: {response:?}");
    };

    let armed = client
        .request(Request::AllowExecution {
            root: root.as_str().to_string(),
            auth: client.credentials(),
        })
        .await?;
    if armed != Response::Ok {
        bail!("arming failed: {armed:?}");
    }

    if follow {
        let state = super::follow_root(client, &root).await?;
        super::print_tree(client, root.as_str()).await?;
        if state != JobState::Success {
            bail!("operation finished {state}");
        }
        Ok(())
    } else {
        print_json(&serde_json::json!({ "root": root.as_str() }))
    }
}
