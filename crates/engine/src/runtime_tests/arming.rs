// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Arming and bottom-up execution of trees.

use super::*;
use pulse_core::test_support::heart_node;
use pulse_core::InstanceState;

#[tokio::test]
async fn register_tree_runs_bottom_up_to_success() {
    let mut harness = Harness::new();
    harness
        .process(Event::NodeRegistered {
            node: heart_node("coord"),
        })
        .await;

    let ids = SequentialIdGen::new("job");
    let plan = trees::register_tree(&ids, &descriptor());
    let root = harness.runtime.submit_tree(plan).await.unwrap();
    harness.drain().await;

    // Nothing moves until the root is armed
    assert_eq!(harness.job_state("job-1"), Some(JobState::New));

    harness.arm(&root).await;

    for id in ["job-1", "job-2", "job-3"] {
        assert_eq!(harness.job_state(id), Some(JobState::Success), "{id}");
    }

    // One instance registered in the allocatable port range
    let state = harness.state.lock();
    assert_eq!(state.instances.len(), 1);
    let instance = state.instances.values().next().unwrap();
    assert_eq!(instance.state, InstanceState::Registered);
    assert!((42600..=42699).contains(&instance.port));
}

// A parent only starts after every child succeeded.
#[tokio::test]
async fn parent_never_runs_before_its_children() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("child", "test.hang", json!({}), Some("root"), None)
        .await;

    harness.arm(&root).await;

    // The child hangs; the root must still be waiting
    assert_eq!(harness.job_state("child"), Some(JobState::Running));
    assert_eq!(harness.job_state("root"), Some(JobState::Waiting));
}

#[tokio::test]
async fn arming_twice_is_a_noop() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("child", "test.hang", json!({}), Some("root"), None)
        .await;

    harness.arm(&root).await;
    harness.arm(&root).await;

    // Still exactly one running child, no duplicate dispatch
    assert_eq!(harness.job_state("child"), Some(JobState::Running));
}

#[tokio::test]
async fn root_context_accumulates_descendant_outputs() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit(
            "child",
            "test.echo",
            json!({"output": {"port": 42600}}),
            Some("root"),
            None,
        )
        .await;

    harness.arm(&root).await;

    assert_eq!(harness.job_state("root"), Some(JobState::Success));
    let state = harness.state.lock();
    let root_job = state.job(root.as_str()).unwrap();
    assert_eq!(root_job.context.get("port"), Some(&json!(42600)));
}

#[tokio::test]
async fn siblings_run_in_parallel_within_the_cap() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    for i in 0..3 {
        harness
            .submit(&format!("leaf-{i}"), "test.hang", json!({}), Some("root"), None)
            .await;
    }

    harness.arm(&root).await;

    for i in 0..3 {
        assert_eq!(
            harness.job_state(&format!("leaf-{i}")),
            Some(JobState::Running)
        );
    }
}

#[tokio::test]
async fn concurrency_cap_bounds_local_dispatch() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    for i in 0..6 {
        harness
            .submit(&format!("leaf-{i}"), "test.hang", json!({}), Some("root"), None)
            .await;
    }

    harness.arm(&root).await;

    let running = (0..6)
        .filter(|i| harness.job_state(&format!("leaf-{i}")) == Some(JobState::Running))
        .count();
    let waiting = (0..6)
        .filter(|i| harness.job_state(&format!("leaf-{i}")) == Some(JobState::Waiting))
        .count();
    assert_eq!(running, 4, "cap is 4 per node");
    assert_eq!(waiting, 2);
}
