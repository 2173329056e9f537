// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deadlines and dispatch retries.

use super::*;

// Scenario: the node goes quiet mid-start. The deadline forces the
// bookkeeping to failed and the ancestors abort.
#[tokio::test]
async fn deadline_forces_a_hung_job_failed() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("stuck", "test.hang", json!({}), Some("root"), None)
        .await;
    harness.arm(&root).await;

    assert_eq!(harness.job_state("stuck"), Some(JobState::Running));

    harness.clock.advance(Duration::from_secs(301));
    harness.fire_timers().await;

    assert_eq!(harness.job_state("stuck"), Some(JobState::Failed));
    assert_eq!(harness.job_summary("stuck").as_deref(), Some("timeout"));
    assert_eq!(harness.job_state("root"), Some(JobState::Aborted));
}

#[tokio::test]
async fn deadline_for_an_abort_requested_job_lands_on_aborted() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("remote", "test.hang", json!({}), Some("root"), Some("n-1"))
        .await;
    harness
        .process(Event::NodeRegistered {
            node: pulse_core::test_support::heart_node("n-1"),
        })
        .await;
    harness.arm(&root).await;

    // Remote body never reports; the operator aborts, the node does not
    // honor it, and the deadline settles the books as aborted.
    harness.runtime.abort(&JobId::new("remote")).await.unwrap();
    harness.drain().await;
    assert_eq!(harness.job_state("remote"), Some(JobState::Running));

    harness.clock.advance(Duration::from_secs(301));
    harness.fire_timers().await;

    assert_eq!(harness.job_state("remote"), Some(JobState::Aborted));
}

#[tokio::test]
async fn unreachable_dispatch_retries_then_fails() {
    let mut harness = Harness::new();
    harness.link.set_unreachable(true);

    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("remote", "test.echo", json!({}), Some("root"), Some("n-1"))
        .await;
    harness.arm(&root).await;

    // Dispatch failed once; the job is running with a retry timer armed
    assert_eq!(harness.job_state("remote"), Some(JobState::Running));

    // Walk the 1s/5s/25s backoff ladder
    for backoff in [1u64, 5, 25] {
        harness.clock.advance(Duration::from_secs(backoff));
        harness.fire_timers().await;
    }

    assert_eq!(harness.job_state("remote"), Some(JobState::Failed));
    assert_eq!(
        harness.job_summary("remote").as_deref(),
        Some("dispatch_failed")
    );
    assert_eq!(harness.job_state("root"), Some(JobState::Aborted));
}

#[tokio::test]
async fn recovered_link_lets_a_retry_through() {
    let mut harness = Harness::new();
    harness.link.set_unreachable(true);

    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("remote", "test.echo", json!({}), Some("root"), Some("n-1"))
        .await;
    harness.arm(&root).await;
    assert!(harness.link.started().is_empty());

    // The node comes back before the first retry fires
    harness.link.set_unreachable(false);
    harness.clock.advance(Duration::from_secs(1));
    harness.fire_timers().await;

    let started = harness.link.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].1.id, JobId::new("remote"));
    assert_eq!(harness.job_state("remote"), Some(JobState::Running));
}
