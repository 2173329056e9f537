// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pulse_core::{Context, Event};

fn created(id: &str, root: &str, parent: Option<&str>, node: Option<&str>) -> Event {
    Event::JobCreated {
        id: JobId::new(id),
        root: JobId::new(root),
        parent: parent.map(JobId::new),
        body_type: "pulse.job.coordinate.register_root".into(),
        parameters: serde_json::json!({}),
        context: Context::new(),
        node: node.map(NodeId::new),
        title: id.into(),
        created_at_ms: 1,
    }
}

fn status(id: &str, state: JobState) -> Event {
    Event::JobStatus {
        id: JobId::new(id),
        state,
        summary: None,
        at: 1,
        log_offset: None,
    }
}

/// root -> a (remote) -> a1; root -> b. Armed, a1 running on n-1.
fn state_with_running_leaf() -> MaterializedState {
    let mut state = MaterializedState::default();
    state.apply_event(&created("root", "root", None, None));
    state.apply_event(&created("a", "root", Some("root"), None));
    state.apply_event(&created("a1", "root", Some("a"), Some("n-1")));
    state.apply_event(&created("b", "root", Some("root"), None));
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    state.apply_event(&status("a1", JobState::Running));
    state
}

// Closure: everything non-terminal is either forced aborted or asked
// to abort.
#[test]
fn abort_of_root_covers_the_whole_tree() {
    let state = state_with_running_leaf();
    let plan = cascade(&state, "root");

    let mut aborted: Vec<_> = plan.aborted.iter().map(|id| id.as_str()).collect();
    aborted.sort();
    assert_eq!(aborted, vec!["a", "b", "root"]);

    assert_eq!(
        plan.cooperative,
        vec![(JobId::new("a1"), Some(NodeId::new("n-1")))]
    );
}

#[test]
fn failure_of_a_leaf_aborts_ancestors_and_waiting_siblings() {
    let mut state = state_with_running_leaf();
    state.apply_event(&status("a1", JobState::Failed));

    let plan = cascade(&state, "a1");
    let mut aborted: Vec<_> = plan.aborted.iter().map(|id| id.as_str()).collect();
    aborted.sort();
    // a and root are ancestors (waiting); b is a waiting sibling
    assert_eq!(aborted, vec!["a", "b", "root"]);
    assert!(plan.cooperative.is_empty());
}

#[test]
fn running_target_is_asked_to_abort_not_forced() {
    let state = state_with_running_leaf();
    let plan = cascade(&state, "a1");

    assert!(plan
        .cooperative
        .contains(&(JobId::new("a1"), Some(NodeId::new("n-1")))));
    assert!(!plan.aborted.contains(&JobId::new("a1")));
}

#[test]
fn running_ancestor_is_forced_and_asked() {
    let mut state = MaterializedState::default();
    state.apply_event(&created("root", "root", None, None));
    state.apply_event(&created("child", "root", Some("root"), None));
    state.apply_event(&Event::JobArmed {
        root: JobId::new("root"),
    });
    // Tree extension: parent runs while its late child is still waiting
    state.apply_event(&status("child", JobState::Running));
    state.apply_event(&created("late", "root", Some("child"), None));
    state.apply_event(&status("late", JobState::Running));
    state.apply_event(&status("late", JobState::Failed));

    let plan = cascade(&state, "late");
    assert!(plan.aborted.contains(&JobId::new("child")));
    assert!(plan.aborted.contains(&JobId::new("root")));
    assert!(plan
        .cooperative
        .contains(&(JobId::new("child"), None)));
}

#[test]
fn terminal_members_are_left_alone() {
    let mut state = state_with_running_leaf();
    state.apply_event(&status("b", JobState::Running));
    state.apply_event(&status("b", JobState::Success));

    let plan = cascade(&state, "a1");
    assert!(!plan.aborted.contains(&JobId::new("b")));
    assert!(!plan
        .cooperative
        .iter()
        .any(|(id, _)| id == &JobId::new("b")));
}

#[test]
fn unknown_target_yields_an_empty_plan() {
    let state = MaterializedState::default();
    assert_eq!(cascade(&state, "ghost"), CascadePlan::default());
}
