// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat grace and node loss.

use super::*;
use pulse_core::test_support::heart_node;
use pulse_core::NodeState;

async fn harness_with_remote_job() -> (Harness, JobId) {
    let mut harness = Harness::new();
    let mut node = heart_node("n-1");
    node.last_heard = harness.clock.epoch_ms();
    harness.process(Event::NodeRegistered { node }).await;

    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("remote", "test.echo", json!({}), Some("root"), Some("n-1"))
        .await;
    harness.arm(&root).await;
    (harness, root)
}

#[tokio::test]
async fn quiet_node_is_declared_lost_after_the_grace_window() {
    let (mut harness, _root) = harness_with_remote_job().await;
    harness.runtime.start_heartbeat_scan();

    // Within the grace window nothing happens
    harness.clock.advance(Duration::from_secs(16));
    harness.fire_timers().await;
    assert_eq!(
        harness.state.lock().nodes["n-1"].state,
        NodeState::Active
    );

    // Past the 30s grace the node is lost and its work fails
    harness.clock.advance(Duration::from_secs(16));
    harness.fire_timers().await;

    assert_eq!(
        harness.state.lock().nodes["n-1"].state,
        NodeState::Inactive
    );
    assert_eq!(harness.job_state("remote"), Some(JobState::Failed));
    assert_eq!(harness.job_summary("remote").as_deref(), Some("node_lost"));
    assert_eq!(harness.job_state("root"), Some(JobState::Aborted));
}

#[tokio::test]
async fn heartbeats_keep_a_node_alive() {
    let (mut harness, _root) = harness_with_remote_job().await;
    harness.runtime.start_heartbeat_scan();

    for _ in 0..4 {
        harness.clock.advance(Duration::from_secs(10));
        harness
            .process(Event::NodeHeartbeat {
                id: NodeId::new("n-1"),
                at: harness.clock.epoch_ms(),
            })
            .await;
        harness.fire_timers().await;
    }

    assert_eq!(harness.state.lock().nodes["n-1"].state, NodeState::Active);
    assert_eq!(harness.job_state("remote"), Some(JobState::Running));
}

#[tokio::test]
async fn node_loss_without_in_flight_work_is_quiet() {
    let mut harness = Harness::new();
    let mut node = heart_node("n-1");
    node.last_heard = harness.clock.epoch_ms();
    harness.process(Event::NodeRegistered { node }).await;

    harness
        .process(Event::NodeLost {
            id: NodeId::new("n-1"),
        })
        .await;
    assert_eq!(
        harness.state.lock().nodes["n-1"].state,
        NodeState::Inactive
    );
}
