// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pulse_core::test_support::job;

#[test]
fn root_subscription_sees_descendant_status() {
    let bus = StatusBus::new();
    let root = JobId::new("root");
    let mut rx = bus.subscribe_root(&root);

    assert_eq!(
        rx.try_recv().unwrap(),
        StatusFrame::Subscribed { root: root.clone() }
    );

    bus.publish_status(&JobId::new("child"), &root, JobState::Running, None, 5);
    match rx.try_recv().unwrap() {
        StatusFrame::Status { id, state, .. } => {
            assert_eq!(id, "child");
            assert_eq!(state, JobState::Running);
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn job_subscription_only_sees_that_job() {
    let bus = StatusBus::new();
    let mut rx = bus.subscribe_job(&JobId::new("a"));

    bus.publish_status(
        &JobId::new("b"),
        &JobId::new("root"),
        JobState::Running,
        None,
        1,
    );
    assert!(rx.try_recv().is_err());

    bus.publish_status(
        &JobId::new("a"),
        &JobId::new("root"),
        JobState::Success,
        Some("ok".into()),
        2,
    );
    assert!(matches!(
        rx.try_recv().unwrap(),
        StatusFrame::Status { state: JobState::Success, .. }
    ));
}

#[test]
fn dropped_subscribers_are_pruned() {
    let bus = StatusBus::new();
    let root = JobId::new("root");
    let rx = bus.subscribe_root(&root);
    drop(rx);

    // Publishing to a topic with only dead subscribers must not error
    bus.publish_tree(&root, vec![job("root", None)]);
    bus.publish_status(&JobId::new("x"), &root, JobState::Running, None, 1);
}

#[test]
fn new_job_frames_carry_the_tree_snapshot() {
    let bus = StatusBus::new();
    let root = JobId::new("root");
    let mut rx = bus.subscribe_root(&root);
    let _ = rx.try_recv(); // subscribed

    bus.publish_new_job(
        &JobId::new("child"),
        &root,
        vec![job("root", None), job("child", Some("root"))],
    );
    match rx.try_recv().unwrap() {
        StatusFrame::New { tree, .. } => assert_eq!(tree.len(), 2),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[test]
fn frames_serialize_with_lowercase_type_tags() {
    let frame = StatusFrame::Error {
        sequence: 7,
        error: "bad".into(),
    };
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["type"], "error");
    assert_eq!(value["sequence"], 7);
}
