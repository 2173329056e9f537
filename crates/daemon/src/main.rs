// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! pulsed - the pulse node daemon

use clap::Parser;
use pulse_core::NodeRole;
use pulse_daemon::listener::{ListenCtx, Listener};
use pulse_daemon::{config::Config, heart, lifecycle, node_channel};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pulsed",
    version,
    about = "pulse node daemon - pacemaker, heart, and router roles"
)]
struct Cli {
    /// Path to the node configuration file
    #[arg(short = 'c', long = "config", default_value = "pulse.toml")]
    config: PathBuf,

    /// Log to stderr instead of the daemon log file
    #[arg(long)]
    foreground: bool,

    /// Log filter, e.g. "info" or "pulse_engine=debug"
    #[arg(long, default_value = "info")]
    loglevel: String,
}

fn init_tracing(cli: &Cli, config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&cli.loglevel)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if cli.foreground {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        None
    } else {
        let _ = std::fs::create_dir_all(&config.state_dir);
        let appender = tracing_appender::rolling::never(
            config.state_dir.clone(),
            "pulsed.log",
        );
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pulsed: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("pulsed: failed to start runtime: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let _guard = init_tracing(&cli, &config);

    match runtime.block_on(run(config)) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            eprintln!("pulsed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(Notify::new());
    spawn_signal_handler(Arc::clone(&shutdown));

    let mut tasks = Vec::new();

    if config.has_role(NodeRole::Pacemaker) {
        let result = lifecycle::startup(&config).await?;

        let ctx = Arc::new(ListenCtx {
            runtime: Arc::clone(&result.daemon.runtime),
            auth: config.auth.clone(),
            shutdown: Arc::clone(&shutdown),
        });
        info!(
            port = config.node.port,
            node_port = config.pacemaker.node_port,
            "pacemaker listening"
        );
        tasks.push(tokio::spawn(Listener::new(result.listener, ctx).run()));
        tasks.push(tokio::spawn(node_channel::serve(
            result.node_listener,
            result.node_ctx,
        )));

        let loop_shutdown = Arc::clone(&shutdown);
        let engine = tokio::spawn(async move {
            if let Err(e) = lifecycle::run(result.daemon, result.event_reader, loop_shutdown).await
            {
                error!("engine loop failed: {e}");
            }
        });

        // Heart role co-hosted with the pacemaker runs in-process via
        // local dispatch; a standalone heart connects out instead.
        engine.await?;
    } else if config.has_role(NodeRole::Heart) {
        heart::run(&config, Arc::clone(&shutdown)).await?;
    } else {
        return Err("no runnable role configured (expected pacemaker or heart)".into());
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}

fn spawn_signal_handler(shutdown: Arc<Notify>) {
    tokio::spawn(async move {
        let mut term =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    error!("failed to install SIGTERM handler: {e}");
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
            _ = term.recv() => info!("SIGTERM received"),
        }
        shutdown.notify_waiters();
    });
}
