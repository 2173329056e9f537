// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pulse_core::test_support::instance;

#[tokio::test]
async fn records_lifecycle_calls_in_order() {
    let fake = FakeRuntime::new();
    let inst = instance("i-1", "n-1", 42600);

    fake.prepare(&inst).await.unwrap();
    fake.start(&inst).await.unwrap();
    fake.stop(&inst).await.unwrap();

    assert_eq!(
        fake.calls(),
        vec![
            RuntimeCall::Prepare("i-1".into()),
            RuntimeCall::Start("i-1".into()),
            RuntimeCall::Stop("i-1".into()),
        ]
    );
    assert_eq!(fake.started(), vec!["i-1"]);
    assert_eq!(fake.stopped(), vec!["i-1"]);
}

#[tokio::test]
async fn fail_start_surfaces_the_message() {
    let fake = FakeRuntime::new();
    fake.fail_start("boom");
    let err = fake.start(&instance("i-1", "n-1", 42600)).await.unwrap_err();
    assert!(err.to_string().contains("boom"));
}

#[tokio::test]
async fn hang_start_never_completes() {
    let fake = FakeRuntime::new();
    fake.hang_start();
    let inst = instance("i-1", "n-1", 42600);
    let result =
        tokio::time::timeout(std::time::Duration::from_millis(50), fake.start(&inst)).await;
    assert!(result.is_err(), "start should still be pending");
}
