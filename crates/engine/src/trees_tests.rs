// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bodies::names;
use pulse_core::test_support::instance;
use pulse_core::{Event, InstanceState, SequentialIdGen};

fn descriptor() -> TypeDescriptor {
    TypeDescriptor {
        instance_type: "type-1".into(),
        runtime: "shell".into(),
        runtime_version: "1".into(),
        version: "1".into(),
        hostnames: vec!["foo.com".into()],
        launch_command: "python app.py --port=%(port)d".into(),
        count: 1,
    }
}

fn state_with_instances(states: &[(&str, InstanceState)]) -> MaterializedState {
    let mut state = MaterializedState::default();
    for (id, instance_state) in states {
        let mut record = instance(id, "n-1", 42600);
        record.state = *instance_state;
        state.apply_event(&Event::InstanceCreated { instance: record });
    }
    state
}

#[test]
fn register_tree_is_a_linear_chain() {
    let ids = SequentialIdGen::new("job");
    let plan = register_tree(&ids, &descriptor());

    assert_eq!(plan.jobs.len(), 3);
    let [root, select, request] = &plan.jobs[..] else {
        panic!("expected three jobs");
    };

    assert_eq!(root.body_type, names::REGISTER_ROOT);
    assert_eq!(root.parent, None);
    assert_eq!(
        root.context.get_str("application_instance_type_id"),
        Some("type-1")
    );

    assert_eq!(select.body_type, names::SELECT_LOCATIONS);
    assert_eq!(select.parent.as_ref(), Some(&root.id));

    assert_eq!(request.body_type, names::REGISTER_REQUEST);
    assert_eq!(request.parent.as_ref(), Some(&select.id));
    assert_eq!(request.parameters["runtime"], "shell");
}

#[test]
fn startup_tree_chains_routing_over_startup_over_pre_startup() {
    let state = state_with_instances(&[("i-1", InstanceState::Registered)]);
    let ids = SequentialIdGen::new("job");
    let plan = startup_tree(&state, &ids, "type-1");

    assert_eq!(plan.jobs.len(), 4);
    let routing = &plan.jobs[1];
    let startup = &plan.jobs[2];
    let pre = &plan.jobs[3];

    assert_eq!(routing.body_type, names::ROUTING_UPDATE);
    assert_eq!(routing.parent.as_ref(), Some(&plan.root));
    assert_eq!(routing.node, None);
    assert_eq!(routing.parameters["add"], true);

    assert_eq!(startup.body_type, names::STARTUP);
    assert_eq!(startup.parent.as_ref(), Some(&routing.id));
    assert_eq!(startup.node.as_ref().map(|n| n.as_str()), Some("n-1"));

    assert_eq!(pre.body_type, names::PRE_STARTUP);
    assert_eq!(pre.parent.as_ref(), Some(&startup.id));
}

#[test]
fn startup_tree_skips_running_instances() {
    let state = state_with_instances(&[
        ("i-1", InstanceState::Running),
        ("i-2", InstanceState::Stopped),
    ]);
    let ids = SequentialIdGen::new("job");
    let plan = startup_tree(&state, &ids, "type-1");

    // Only the stopped instance gets a chain
    assert_eq!(plan.jobs.len(), 4);
    assert!(plan.jobs[2].parameters["instance"]["id"] == "i-2");
}

#[test]
fn shutdown_tree_removes_routing_before_stopping() {
    let state = state_with_instances(&[("i-1", InstanceState::Running)]);
    let ids = SequentialIdGen::new("job");
    let plan = shutdown_tree(&state, &ids, "type-1");

    assert_eq!(plan.jobs.len(), 3);
    let shutdown = &plan.jobs[1];
    let routing = &plan.jobs[2];

    assert_eq!(shutdown.body_type, names::SHUTDOWN);
    assert_eq!(shutdown.parent.as_ref(), Some(&plan.root));

    // The leaf (routing remove) runs first
    assert_eq!(routing.body_type, names::ROUTING_UPDATE);
    assert_eq!(routing.parent.as_ref(), Some(&shutdown.id));
    assert_eq!(routing.parameters["add"], false);
}

#[test]
fn deregister_tree_covers_non_running_instances() {
    let state = state_with_instances(&[
        ("i-1", InstanceState::Stopped),
        ("i-2", InstanceState::Running),
        ("i-3", InstanceState::Error),
    ]);
    let ids = SequentialIdGen::new("job");
    let plan = deregister_tree(&state, &ids, "type-1");

    assert_eq!(plan.jobs.len(), 3);
    for job in &plan.jobs[1..] {
        assert_eq!(job.body_type, names::DEREGISTER);
        assert_ne!(job.parameters["instance"]["id"], "i-2");
    }
}

#[test]
fn empty_instance_set_yields_a_bare_root() {
    let state = MaterializedState::default();
    let ids = SequentialIdGen::new("job");
    let plan = startup_tree(&state, &ids, "type-1");
    assert_eq!(plan.jobs.len(), 1);
    assert_eq!(plan.jobs[0].id, plan.root);
}
