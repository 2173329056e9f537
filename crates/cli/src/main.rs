// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pulse - command-line client for the pulse control plane

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{job, log, node, version};
use tracing_subscriber::EnvFilter;

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "pulse - deploy and run applications across a cluster"
)]
struct Cli {
    /// Pacemaker host to talk to
    #[arg(long = "remote", global = true, default_value = "127.0.0.1")]
    remote: String,

    /// Pacemaker control port
    #[arg(long = "port", global = true, default_value_t = 42500)]
    port: u16,

    /// Super or API token
    #[arg(long = "key", global = true, default_value = "")]
    key: String,

    /// Present the key as the super token instead of an API token
    #[arg(long = "super", global = true)]
    super_key: bool,

    /// Log filter, e.g. "info" or "debug"
    #[arg(long = "loglevel", global = true, default_value = "warn")]
    loglevel: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Node management
    #[command(subcommand)]
    Node(node::NodeCommand),
    /// Job management
    #[command(subcommand)]
    Job(job::JobCommand),
    /// Job log streams
    #[command(subcommand)]
    Log(log::LogCommand),
    /// Application version lifecycle
    #[command(subcommand)]
    Version(version::VersionCommand),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.loglevel).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("pulse: failed to start runtime: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pulse: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let client = DaemonClient::new(&cli.remote, cli.port, &cli.key, cli.super_key);

    match cli.command {
        Commands::Node(command) => node::run(command, &client).await,
        Commands::Job(command) => job::run(command, &client).await,
        Commands::Log(command) => log::run(command, &client).await,
        Commands::Version(command) => version::run(command, &client).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_have_spec_defaults() {
        let cli = Cli::try_parse_from(["pulse", "node", "list"]).unwrap();
        assert_eq!(cli.remote, "127.0.0.1");
        assert_eq!(cli.port, 42500);
        assert!(cli.key.is_empty());
    }

    #[test]
    fn job_abort_parses() {
        let cli = Cli::try_parse_from([
            "pulse", "--remote", "pm.example", "--key", "k", "job", "abort", "job-1",
        ])
        .unwrap();
        assert_eq!(cli.remote, "pm.example");
        assert!(matches!(
            cli.command,
            Commands::Job(job::JobCommand::Abort { .. })
        ));
    }

    #[test]
    fn log_stream_supports_position_and_follow() {
        let cli = Cli::try_parse_from([
            "pulse", "log", "stream", "job-1", "--position", "1024", "--follow",
        ])
        .unwrap();
        let Commands::Log(log::LogCommand::Stream {
            position, follow, ..
        }) = cli.command
        else {
            panic!("wrong command");
        };
        assert_eq!(position, 1024);
        assert!(follow);
    }

    #[test]
    fn version_register_requires_a_hostname() {
        let missing = Cli::try_parse_from([
            "pulse",
            "version",
            "register",
            "type-1",
            "--launch-command",
            "./serve",
        ]);
        assert!(missing.is_err());

        let ok = Cli::try_parse_from([
            "pulse",
            "version",
            "register",
            "type-1",
            "--launch-command",
            "./serve",
            "--hostname",
            "foo.com",
            "--follow",
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn help_lists_noun_groups() {
        use clap::CommandFactory;
        let mut command = Cli::command();
        let help = command.render_long_help().to_string();
        for noun in ["node", "job", "log", "version"] {
            assert!(help.contains(noun), "missing {noun} in help");
        }
    }
}
