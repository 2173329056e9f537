// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote dispatch over the node link.

use super::*;

#[tokio::test]
async fn remote_jobs_ship_parameters_and_context() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("feeder", "test.echo", json!({"output": {"seed": 7}}), Some("root"), None)
        .await;
    harness.drain().await;

    // feeder's output lands in root's context before root runs; a
    // remote child added under root later... keep it simple: the frame
    // carries exactly what the store holds at dispatch time.
    harness
        .submit(
            "remote",
            "test.echo",
            json!({"payload": true}),
            Some("root"),
            Some("n-1"),
        )
        .await;
    harness.arm(&root).await;

    let started = harness.link.started();
    let frame = &started
        .iter()
        .find(|(node, _)| node == &NodeId::new("n-1"))
        .unwrap()
        .1;
    assert_eq!(frame.id, JobId::new("remote"));
    assert_eq!(frame.body_type, "test.echo");
    assert_eq!(frame.parameters["payload"], true);
}

#[tokio::test]
async fn remote_result_completes_the_job() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("remote", "test.echo", json!({}), Some("root"), Some("n-1"))
        .await;
    harness.arm(&root).await;
    assert_eq!(harness.job_state("remote"), Some(JobState::Running));

    harness
        .process(Event::JobResult {
            id: JobId::new("remote"),
            state: JobState::Success,
            summary: Some("done on n-1".into()),
            output: Context::new(),
        })
        .await;
    harness.drain().await;

    assert_eq!(harness.job_state("remote"), Some(JobState::Success));
    assert_eq!(harness.job_state("root"), Some(JobState::Success));
}

#[tokio::test]
async fn jobs_pinned_to_the_coordinator_run_locally() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("local", "test.echo", json!({}), Some("root"), Some("coord"))
        .await;
    harness.arm(&root).await;

    // No frame left the process; the job ran through the local path
    assert!(harness.link.started().is_empty());
    assert_eq!(harness.job_state("local"), Some(JobState::Success));
}

#[tokio::test]
async fn abort_of_a_remote_job_sends_an_abort_frame() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("remote", "test.hang", json!({}), Some("root"), Some("n-1"))
        .await;
    harness.arm(&root).await;

    harness.runtime.abort(&root).await.unwrap();
    harness.drain().await;

    let aborted = harness.link.aborted();
    assert!(aborted.contains(&(NodeId::new("n-1"), JobId::new("remote"))));
}
