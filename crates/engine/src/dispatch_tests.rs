// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn begin_rejects_double_dispatch() {
    let mut dispatcher = Dispatcher::new();
    let now = Instant::now();
    assert!(dispatcher.begin(&JobId::new("j-1"), None, now, Duration::from_secs(300)));
    assert!(!dispatcher.begin(&JobId::new("j-1"), None, now, Duration::from_secs(300)));
}

#[test]
fn node_counts_track_effective_targets() {
    let mut dispatcher = Dispatcher::new();
    let now = Instant::now();
    let n1 = NodeId::new("n-1");

    dispatcher.begin(&JobId::new("a"), Some(n1.clone()), now, Duration::from_secs(1));
    dispatcher.begin(&JobId::new("b"), Some(n1.clone()), now, Duration::from_secs(1));
    dispatcher.begin(&JobId::new("c"), None, now, Duration::from_secs(1));

    assert_eq!(dispatcher.count_for_node(Some(&n1)), 2);
    assert_eq!(dispatcher.count_for_node(None), 1);

    dispatcher.complete("a");
    assert_eq!(dispatcher.count_for_node(Some(&n1)), 1);
}

#[test]
fn unreachable_attempts_count_up() {
    let mut dispatcher = Dispatcher::new();
    let id = JobId::new("j-1");
    dispatcher.begin(&id, Some(NodeId::new("n-1")), Instant::now(), Duration::from_secs(1));

    assert_eq!(dispatcher.record_unreachable("j-1"), 2);
    assert_eq!(dispatcher.record_unreachable("j-1"), 3);
    assert_eq!(dispatcher.record_unreachable("missing"), 0);
}

#[test]
fn backoff_schedule_is_1_5_25_seconds() {
    assert_eq!(Dispatcher::backoff(1), Duration::from_secs(1));
    assert_eq!(Dispatcher::backoff(2), Duration::from_secs(5));
    assert_eq!(Dispatcher::backoff(3), Duration::from_secs(25));
    // Clamped past the schedule
    assert_eq!(Dispatcher::backoff(9), Duration::from_secs(25));
}

#[test]
fn abort_requested_flag_sticks_until_complete() {
    let mut dispatcher = Dispatcher::new();
    let id = JobId::new("j-1");
    dispatcher.begin(&id, None, Instant::now(), Duration::from_secs(1));

    assert!(!dispatcher.is_abort_requested("j-1"));
    dispatcher.mark_abort_requested("j-1");
    assert!(dispatcher.is_abort_requested("j-1"));

    dispatcher.complete("j-1");
    assert!(!dispatcher.is_abort_requested("j-1"));
}

#[test]
fn jobs_on_node_lists_in_flight_work() {
    let mut dispatcher = Dispatcher::new();
    let now = Instant::now();
    let n1 = NodeId::new("n-1");
    dispatcher.begin(&JobId::new("a"), Some(n1.clone()), now, Duration::from_secs(1));
    dispatcher.begin(&JobId::new("b"), None, now, Duration::from_secs(1));

    let jobs = dispatcher.jobs_on_node(&n1);
    assert_eq!(jobs, vec![JobId::new("a")]);
}
