// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::Config;
use pulse_core::{JobId, JobState};

fn test_config(dir: &tempfile::TempDir) -> Config {
    let raw = format!(
        r#"
state_dir = "{}"

[node]
port = 0
roles = ["pacemaker", "heart"]
tags = {{ runtimes = {{ shell = ["1"] }} }}

[pacemaker]
node_port = 0

[auth]
super_token = "s3cret"
"#,
        dir.path().display()
    );
    toml::from_str(&raw).unwrap()
}

async fn drive_until_quiet(daemon: &DaemonState, event_reader: &mut EventReader) {
    loop {
        let next =
            tokio::time::timeout(std::time::Duration::from_millis(150), event_reader.recv()).await;
        match next {
            Ok(Ok(Some(entry))) => {
                daemon.process_event(&entry.event).await.unwrap();
                event_reader.mark_processed(entry.seq);
            }
            _ => break,
        }
    }
}

#[tokio::test]
async fn startup_registers_the_local_node() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let mut result = startup(&config).await.unwrap();
    drive_until_quiet(&result.daemon, &mut result.event_reader).await;

    let state = result.daemon.state.lock();
    assert_eq!(state.nodes.len(), 1);
    let node = state.nodes.values().next().unwrap();
    assert!(node.supports_runtime("shell", "1"));
}

#[tokio::test]
async fn second_daemon_cannot_take_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let _first = startup(&config).await.unwrap();
    let second = startup(&config).await;
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));
}

#[tokio::test]
async fn restart_replays_the_wal_and_fails_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    // First generation: a tree gets armed and a job starts running
    {
        let mut result = startup(&config).await.unwrap();
        drive_until_quiet(&result.daemon, &mut result.event_reader).await;

        let root = result
            .daemon
            .runtime
            .submit_tree(pulse_engine::trees::register_tree(
                result.daemon.runtime.ids().as_ref(),
                &pulse_engine::TypeDescriptor {
                    instance_type: "type-1".into(),
                    runtime: "shell".into(),
                    runtime_version: "1".into(),
                    version: "1".into(),
                    hostnames: vec!["foo.com".into()],
                    launch_command: "sleep 1".into(),
                    count: 1,
                },
            ))
            .await
            .unwrap();

        // Arm and process entries until something is running, then stop
        // driving so the persisted state keeps an in-flight job
        result.daemon.runtime.allow_execution(&root).await.unwrap();
        loop {
            let next = tokio::time::timeout(
                std::time::Duration::from_millis(300),
                result.event_reader.recv(),
            )
            .await;
            let Ok(Ok(Some(entry))) = next else { break };
            result.daemon.process_event(&entry.event).await.unwrap();
            result.event_reader.mark_processed(entry.seq);
            let running = result
                .daemon
                .state
                .lock()
                .jobs
                .values()
                .any(|j| j.state == JobState::Running);
            if running {
                break;
            }
        }
        result.daemon.event_bus.flush().unwrap();
        // Drop without clean shutdown: simulates a crash
    }

    // Second generation replays and settles every job to terminal
    let mut result = startup(&config).await.unwrap();
    drive_until_quiet(&result.daemon, &mut result.event_reader).await;

    let state = result.daemon.state.lock();
    assert!(!state.jobs.is_empty());
    for job in state.jobs.values() {
        assert!(
            job.state != JobState::Running,
            "job {} still running after recovery",
            job.id
        );
    }
}

#[tokio::test]
async fn shutdown_writes_a_final_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let mut result = startup(&config).await.unwrap();
    drive_until_quiet(&result.daemon, &mut result.event_reader).await;
    result.daemon.shutdown().unwrap();

    let snapshot = pulse_storage::load_snapshot(&config.snapshot_path())
        .unwrap()
        .unwrap();
    assert!(snapshot.seq > 0);
    assert!(!config.lock_path().exists());
}

#[tokio::test]
async fn abort_through_the_runtime_settles_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);

    let mut result = startup(&config).await.unwrap();
    drive_until_quiet(&result.daemon, &mut result.event_reader).await;

    let root = result
        .daemon
        .runtime
        .submit_job(pulse_core::JobSpec {
            id: JobId::new("solo"),
            body_type: "pulse.job.coordinate.register_root".into(),
            title: "solo".into(),
            parameters: serde_json::json!({}),
            parent: None,
            node: None,
            context: Default::default(),
        })
        .await
        .unwrap();
    drive_until_quiet(&result.daemon, &mut result.event_reader).await;

    // Never armed: an abort settles the root directly
    result.daemon.runtime.abort(&root).await.unwrap();
    drive_until_quiet(&result.daemon, &mut result.event_reader).await;

    assert_eq!(
        result.daemon.state.lock().job("solo").map(|j| j.state),
        Some(JobState::Aborted)
    );
}
