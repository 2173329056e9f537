// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result handling: context propagation, duplicate and late delivery.

use super::*;
use pulse_core::KEY_INSTANCES;

#[tokio::test]
async fn context_merges_in_finish_order_later_wins() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.hang", json!({}), None, None)
        .await;
    harness
        .submit("a", "test.hang", json!({}), Some("root"), None)
        .await;
    harness
        .submit("b", "test.hang", json!({}), Some("root"), None)
        .await;
    harness.arm(&root).await;

    // Finish b first, then a: a's value wins the conflicting key
    harness
        .process(Event::JobResult {
            id: JobId::new("b"),
            state: JobState::Success,
            summary: None,
            output: [("winner", json!("b")), ("b_only", json!(1))]
                .into_iter()
                .collect(),
        })
        .await;
    harness
        .process(Event::JobResult {
            id: JobId::new("a"),
            state: JobState::Success,
            summary: None,
            output: [("winner", json!("a")), ("a_only", json!(2))]
                .into_iter()
                .collect(),
        })
        .await;
    harness.drain().await;

    let state = harness.state.lock();
    let root_job = state.job("root").unwrap();
    assert_eq!(root_job.context.get("winner"), Some(&json!("a")));
    assert_eq!(root_job.context.get("a_only"), Some(&json!(2)));
    assert_eq!(root_job.context.get("b_only"), Some(&json!(1)));
}

#[tokio::test]
async fn instances_outputs_union_across_siblings() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.hang", json!({}), None, None)
        .await;
    for id in ["a", "b"] {
        harness
            .submit(id, "test.hang", json!({}), Some("root"), None)
            .await;
    }
    harness.arm(&root).await;

    for (id, instance) in [("a", "i-1"), ("b", "i-2")] {
        harness
            .process(Event::JobResult {
                id: JobId::new(id),
                state: JobState::Success,
                summary: None,
                output: [(KEY_INSTANCES, json!({ instance: "running" }))]
                    .into_iter()
                    .collect(),
            })
            .await;
    }

    let state = harness.state.lock();
    let root_job = state.job("root").unwrap();
    let mut ids = root_job.context.instance_ids();
    ids.sort();
    assert_eq!(ids, vec!["i-1", "i-2"]);
}

// Scenario 5: a reconnecting node re-reports SUCCESS; the second report
// is ignored and at most one status event is published.
#[tokio::test]
async fn duplicate_success_delivery_is_ignored() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.hang", json!({}), None, None)
        .await;
    harness
        .submit("child", "test.hang", json!({}), Some("root"), None)
        .await;
    harness.arm(&root).await;

    let bus = harness.runtime.status_bus();
    let mut status_rx = bus.subscribe_job(&JobId::new("child"));

    let result = Event::JobResult {
        id: JobId::new("child"),
        state: JobState::Success,
        summary: Some("done".into()),
        output: Context::new(),
    };
    harness.process(result.clone()).await;
    let finished_at = harness.state.lock().job("child").unwrap().time_finished;

    harness.process(result).await;
    harness.drain().await;

    let job = harness.state.lock().job("child").cloned().unwrap();
    assert_eq!(job.state, JobState::Success);
    assert_eq!(job.time_finished, finished_at);

    let mut success_frames = 0;
    while let Ok(frame) = status_rx.try_recv() {
        if matches!(
            frame,
            crate::status_bus::StatusFrame::Status {
                state: JobState::Success,
                ..
            }
        ) {
            success_frames += 1;
        }
    }
    assert_eq!(success_frames, 1);
}

#[tokio::test]
async fn conflicting_terminal_report_is_logged_not_applied() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.hang", json!({}), None, None)
        .await;
    harness
        .submit("child", "test.hang", json!({}), Some("root"), None)
        .await;
    harness.arm(&root).await;

    harness
        .process(Event::JobResult {
            id: JobId::new("child"),
            state: JobState::Success,
            summary: None,
            output: Context::new(),
        })
        .await;
    harness
        .process(Event::JobResult {
            id: JobId::new("child"),
            state: JobState::Failed,
            summary: Some("late failure".into()),
            output: Context::new(),
        })
        .await;

    assert_eq!(harness.job_state("child"), Some(JobState::Success));
    // The tree was not torn down by the conflicting report
    assert_ne!(harness.job_state("root"), Some(JobState::Aborted));
}

#[tokio::test]
async fn success_output_drives_instance_state() {
    let mut harness = Harness::new();
    harness
        .process(Event::InstanceCreated {
            instance: pulse_core::test_support::instance("i-1", "n-1", 42600),
        })
        .await;

    let root = harness
        .submit("root", "test.hang", json!({}), None, None)
        .await;
    harness
        .submit("child", "test.hang", json!({}), Some("root"), None)
        .await;
    harness.arm(&root).await;

    harness
        .process(Event::JobResult {
            id: JobId::new("child"),
            state: JobState::Success,
            summary: None,
            output: [(KEY_INSTANCES, json!({"i-1": "running"}))]
                .into_iter()
                .collect(),
        })
        .await;

    let state = harness.state.lock();
    assert_eq!(
        state.instances["i-1"].state,
        pulse_core::InstanceState::Running
    );
}
