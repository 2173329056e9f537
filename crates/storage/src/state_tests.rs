// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pulse_core::test_support::{heart_node, instance};
use pulse_core::{Context, InstanceId, InstanceState};
use serde_json::json;

fn created(id: &str, root: &str, parent: Option<&str>) -> Event {
    Event::JobCreated {
        id: JobId::new(id),
        root: JobId::new(root),
        parent: parent.map(JobId::new),
        body_type: "pulse.job.coordinate.register_root".into(),
        parameters: json!({}),
        context: Context::new(),
        node: None,
        title: id.into(),
        created_at_ms: 1,
    }
}

fn status(id: &str, state: JobState, at: u64) -> Event {
    Event::JobStatus {
        id: JobId::new(id),
        state,
        summary: None,
        at,
        log_offset: None,
    }
}

/// Build a three-job tree: root with children a and b.
fn tree_state() -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply_event(&created("root", "root", None));
    state.apply_event(&created("a", "root", Some("root")));
    state.apply_event(&created("b", "root", Some("root")));
    state
}

#[test]
fn creation_indexes_children_and_members() {
    let state = tree_state();
    assert_eq!(state.jobs.len(), 3);
    assert_eq!(state.children_of("root").len(), 2);
    assert_eq!(state.tree_of("root").len(), 3);
    assert_eq!(state.roots().len(), 1);
}

#[test]
fn duplicate_creation_is_ignored() {
    let mut state = tree_state();
    state.apply_event(&created("a", "root", Some("root")));
    assert_eq!(state.jobs.len(), 3);
    assert_eq!(state.children_of("root").len(), 2);
}

#[test]
fn arming_flips_new_jobs_to_waiting() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    for job in state.tree_of("root") {
        assert_eq!(job.state, JobState::Waiting);
    }
}

#[test]
fn arming_twice_is_a_noop() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    state.apply_event(&status("a", JobState::Running, 5));
    // Second arm must not disturb the running job
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    assert_eq!(state.job("a").unwrap().state, JobState::Running);
}

#[test]
fn jobs_created_under_an_armed_root_start_waiting() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    state.apply_event(&created("late", "root", Some("a")));
    assert_eq!(state.job("late").unwrap().state, JobState::Waiting);
}

#[test]
fn duplicate_terminal_status_is_ignored() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    state.apply_event(&status("a", JobState::Running, 5));
    state.apply_event(&status("a", JobState::Success, 6));
    state.apply_event(&status("a", JobState::Success, 7));

    let job = state.job("a").unwrap();
    assert_eq!(job.state, JobState::Success);
    assert_eq!(job.time_finished, Some(6));
}

#[test]
fn conflicting_terminal_status_is_rejected() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    state.apply_event(&status("a", JobState::Running, 5));
    state.apply_event(&status("a", JobState::Success, 6));
    state.apply_event(&status("a", JobState::Failed, 7));

    assert_eq!(state.job("a").unwrap().state, JobState::Success);
}

#[test]
fn log_offset_is_monotone() {
    let mut state = tree_state();
    state.apply_event(&Event::JobStatus {
        id: JobId::new("a"),
        state: JobState::New,
        summary: None,
        at: 1,
        log_offset: Some(100),
    });
    state.apply_event(&Event::JobStatus {
        id: JobId::new("a"),
        state: JobState::New,
        summary: None,
        at: 2,
        log_offset: Some(40),
    });
    assert_eq!(state.job("a").unwrap().log_offset_end, 100);
}

#[test]
fn context_fragments_merge_in_order() {
    let mut state = tree_state();
    state.apply_event(&Event::JobContext {
        id: JobId::new("root"),
        fragment: [("port", json!(42600))].into_iter().collect(),
    });
    state.apply_event(&Event::JobContext {
        id: JobId::new("root"),
        fragment: [("port", json!(42601))].into_iter().collect(),
    });
    assert_eq!(
        state.job("root").unwrap().context.get("port"),
        Some(&json!(42601))
    );
}

#[test]
fn descendants_and_ancestors_walk_edges() {
    let mut state = tree_state();
    state.apply_event(&created("a1", "root", Some("a")));

    let mut descendants: Vec<String> = state
        .descendants_of("root")
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    descendants.sort();
    assert_eq!(descendants, vec!["a", "a1", "b"]);

    let ancestors: Vec<String> = state
        .ancestors_of("a1")
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    assert_eq!(ancestors, vec!["a", "root"]);
}

#[test]
fn children_all_succeeded_requires_every_child() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    assert!(!state.children_all_succeeded("root"));

    state.apply_event(&status("a", JobState::Running, 5));
    state.apply_event(&status("a", JobState::Success, 6));
    assert!(!state.children_all_succeeded("root"));

    state.apply_event(&status("b", JobState::Running, 7));
    state.apply_event(&status("b", JobState::Success, 8));
    assert!(state.children_all_succeeded("root"));

    // Leaves have no children and are trivially ready
    assert!(state.children_all_succeeded("a"));
}

#[test]
fn node_lifecycle_projection() {
    let mut state = MaterializedState::default();
    state.apply_event(&Event::NodeRegistered {
        node: heart_node("n-1"),
    });
    state.apply_event(&Event::NodeHeartbeat {
        id: pulse_core::NodeId::new("n-1"),
        at: 99,
    });
    assert_eq!(state.nodes["n-1"].last_heard, 99);

    state.apply_event(&Event::NodeLost {
        id: pulse_core::NodeId::new("n-1"),
    });
    assert_eq!(state.nodes["n-1"].state, NodeState::Inactive);
}

#[test]
fn instance_projection_tracks_state() {
    let mut state = MaterializedState::default();
    state.apply_event(&Event::InstanceCreated {
        instance: instance("i-1", "n-1", 42600),
    });
    state.apply_event(&Event::InstanceStateChanged {
        id: InstanceId::new("i-1"),
        state: InstanceState::Running,
    });
    assert_eq!(state.instances["i-1"].state, InstanceState::Running);
}

#[test]
fn prefix_lookup_requires_uniqueness() {
    let state = tree_state();
    assert!(state.job_by_prefix("roo").is_some());
    // "a" and "b" both exist; a shared prefix of nothing returns None
    assert!(state.job_by_prefix("zzz").is_none());
}

#[test]
fn live_armed_roots_excludes_terminal_trees() {
    let mut state = tree_state();
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    assert_eq!(state.live_armed_roots().len(), 1);

    for id in ["a", "b", "root"] {
        state.apply_event(&status(id, JobState::Running, 5));
        state.apply_event(&status(id, JobState::Success, 6));
    }
    assert!(state.live_armed_roots().is_empty());
}
