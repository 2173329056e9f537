// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abort cascades and cooperative cancellation.

use super::*;

/// root -> a(hang, running) ; root -> b(waiting behind hang child b1).
async fn armed_harness() -> (Harness, JobId) {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("a", "test.hang", json!({}), Some("root"), None)
        .await;
    harness
        .submit("b", "test.echo", json!({}), Some("root"), None)
        .await;
    harness
        .submit("b1", "test.hang", json!({}), Some("b"), None)
        .await;
    harness.arm(&root).await;
    (harness, root)
}

// After abort(root), every member reaches a terminal state once the
// cooperative bodies honor their tokens.
#[tokio::test]
async fn abort_closes_the_whole_tree() {
    let (mut harness, root) = armed_harness().await;

    assert_eq!(harness.job_state("a"), Some(JobState::Running));
    assert_eq!(harness.job_state("b"), Some(JobState::Waiting));

    harness.runtime.abort(&root).await.unwrap();
    harness.drain().await;

    for id in ["root", "a", "b", "b1"] {
        let state = harness.job_state(id).unwrap();
        assert!(state.is_terminal(), "{id} still {state}");
        assert_eq!(state, JobState::Aborted, "{id}");
    }
}

// Scenario: abort while the running body is mid-flight. The body honors
// the token, reports, and the bookkeeping lands on aborted.
#[tokio::test]
async fn running_body_honors_the_abort_token() {
    let (mut harness, root) = armed_harness().await;

    harness.runtime.abort(&root).await.unwrap();
    harness.drain().await;

    // HangBody resolves to Aborted on cancellation and its result is
    // folded in as aborted, not failed.
    assert_eq!(harness.job_state("a"), Some(JobState::Aborted));
    assert_eq!(harness.job_state("root"), Some(JobState::Aborted));
}

#[tokio::test]
async fn late_success_after_abort_request_is_discarded() {
    let (mut harness, _root) = armed_harness().await;

    // Abort only the running leaf; the cascade settles it
    harness.runtime.abort(&JobId::new("a")).await.unwrap();
    harness.drain().await;

    // A stale success arrives from the node after the books closed
    harness
        .process(Event::JobResult {
            id: JobId::new("a"),
            state: JobState::Success,
            summary: Some("too late".into()),
            output: [("ghost", json!(true))].into_iter().collect(),
        })
        .await;
    harness.drain().await;

    assert_eq!(harness.job_state("a"), Some(JobState::Aborted));
    // The discarded output must not have leaked into the parent
    let state = harness.state.lock();
    assert_eq!(state.job("root").unwrap().context.get("ghost"), None);
}

#[tokio::test]
async fn abort_of_a_leaf_aborts_its_ancestors_only_after_cascade() {
    let (mut harness, _root) = armed_harness().await;

    harness.runtime.abort(&JobId::new("b1")).await.unwrap();
    harness.drain().await;

    // Ancestors aborted; the unrelated running sibling was asked to
    // abort as part of the tree teardown and honored it.
    assert_eq!(harness.job_state("b1"), Some(JobState::Aborted));
    assert_eq!(harness.job_state("b"), Some(JobState::Aborted));
    assert_eq!(harness.job_state("root"), Some(JobState::Aborted));
    assert_eq!(harness.job_state("a"), Some(JobState::Aborted));
}

#[tokio::test]
async fn failure_cascades_to_abort_not_failed() {
    let mut harness = Harness::new();
    let root = harness
        .submit("root", "test.echo", json!({}), None, None)
        .await;
    harness
        .submit("bad", "test.fail", json!({"message": "boom"}), Some("root"), None)
        .await;
    harness
        .submit("idle", "test.echo", json!({}), Some("bad"), None)
        .await;
    harness.arm(&root).await;

    assert_eq!(harness.job_state("idle"), Some(JobState::Success));
    assert_eq!(harness.job_state("bad"), Some(JobState::Failed));
    assert_eq!(harness.job_summary("bad").as_deref(), Some("boom"));
    // The ancestor is aborted, never failed
    assert_eq!(harness.job_state("root"), Some(JobState::Aborted));
}

#[tokio::test]
async fn aborted_tree_leaves_waiting_jobs_untouched_by_the_selector() {
    let (mut harness, root) = armed_harness().await;
    harness.runtime.abort(&root).await.unwrap();
    harness.drain().await;

    // b1 was waiting-behind nothing (a leaf); after the cascade it must
    // be aborted rather than picked up by a later selection pass.
    assert_eq!(harness.job_state("b1"), Some(JobState::Aborted));
}
