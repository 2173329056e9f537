// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders for the four coordinate job trees.
//!
//! Children are prerequisites: the deepest job runs first and outputs
//! flow up the tree. Register is a linear chain (placement, then
//! selection, then the pivot); startup/shutdown/deregister hang one
//! chain per instance off the root.

use crate::bodies::names;
use crate::registry::BodyIdGen;
use pulse_core::{Context, InstanceRecord, InstanceState, JobId, JobSpec};
use pulse_storage::MaterializedState;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Projection of an application version's instance type, supplied by
/// the controller that submits the tree. The entity store behind it is
/// not this subsystem's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub instance_type: String,
    pub runtime: String,
    pub runtime_version: String,
    /// Version label used in routing set keys
    pub version: String,
    pub hostnames: Vec<String>,
    pub launch_command: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    1
}

/// A planned tree: specs in creation order, root first.
#[derive(Debug, Clone)]
pub struct TreePlan {
    pub root: JobId,
    pub jobs: Vec<JobSpec>,
}

fn spec(
    id: JobId,
    body_type: &str,
    title: String,
    parameters: serde_json::Value,
    parent: Option<JobId>,
    node: Option<pulse_core::NodeId>,
) -> JobSpec {
    JobSpec {
        id,
        body_type: body_type.to_string(),
        title,
        parameters,
        parent,
        node,
        context: Context::new(),
    }
}

/// Register tree: placement request feeding location selection.
///
///   register_root
///   └── select_locations
///       └── register_request
pub fn register_tree(ids: &dyn BodyIdGen, descriptor: &TypeDescriptor) -> TreePlan {
    let root_id = JobId::new(ids.next_id());
    let select_id = JobId::new(ids.next_id());
    let request_id = JobId::new(ids.next_id());

    let mut root = spec(
        root_id.clone(),
        names::REGISTER_ROOT,
        "Select locations and register instances".into(),
        json!({}),
        None,
        None,
    );
    root.context = [(
        "application_instance_type_id",
        json!(descriptor.instance_type),
    )]
    .into_iter()
    .collect();

    let select = spec(
        select_id.clone(),
        names::SELECT_LOCATIONS,
        "Select instance locations".into(),
        serde_json::to_value(descriptor).unwrap_or_default(),
        Some(root_id.clone()),
        None,
    );

    let request = spec(
        request_id,
        names::REGISTER_REQUEST,
        "Registration requests".into(),
        json!({
            "instance_type": descriptor.instance_type,
            "runtime": descriptor.runtime,
            "runtime_version": descriptor.runtime_version,
        }),
        Some(select_id),
        None,
    );

    TreePlan {
        root: root_id,
        jobs: vec![root, select, request],
    }
}

fn instances_of_type(
    state: &MaterializedState,
    instance_type: &str,
    states: &[InstanceState],
) -> Vec<InstanceRecord> {
    let mut instances: Vec<_> = state
        .instances
        .values()
        .filter(|i| i.instance_type == instance_type)
        .filter(|i| states.contains(&i.state))
        .cloned()
        .collect();
    instances.sort_by(|a, b| a.id.cmp(&b.id));
    instances
}

/// Startup tree: per instance, routing waits on startup which waits on
/// pre-startup.
///
///   startup_root
///   └── routing.update(add)      (coordinator)
///       └── heart.startup        (instance's node)
///           └── heart.pre_startup (instance's node)
pub fn startup_tree(
    state: &MaterializedState,
    ids: &dyn BodyIdGen,
    instance_type: &str,
) -> TreePlan {
    let root_id = JobId::new(ids.next_id());
    let mut jobs = vec![spec(
        root_id.clone(),
        names::STARTUP_ROOT,
        "Start up instances and alter routing".into(),
        json!({}),
        None,
        None,
    )];

    let startable = instances_of_type(
        state,
        instance_type,
        &[InstanceState::Registered, InstanceState::Stopped],
    );
    for instance in startable {
        let routing_id = JobId::new(ids.next_id());
        let startup_id = JobId::new(ids.next_id());
        let pre_id = JobId::new(ids.next_id());

        jobs.push(spec(
            routing_id.clone(),
            names::ROUTING_UPDATE,
            format!("Update routing for {}", instance.id),
            json!({"instance_id": instance.id.as_str(), "add": true}),
            Some(root_id.clone()),
            None,
        ));
        jobs.push(spec(
            startup_id.clone(),
            names::STARTUP,
            format!("Startup instance {} on node {}", instance.id, instance.node),
            json!({ "instance": &instance }),
            Some(routing_id),
            Some(instance.node.clone()),
        ));
        jobs.push(spec(
            pre_id,
            names::PRE_STARTUP,
            format!(
                "Pre startup instance {} on node {}",
                instance.id, instance.node
            ),
            json!({ "instance": &instance }),
            Some(startup_id),
            Some(instance.node.clone()),
        ));
    }

    TreePlan {
        root: root_id,
        jobs,
    }
}

/// Shutdown tree: routing entries leave the table before the instance
/// stops, so no traffic lands on a dying process.
///
///   shutdown_root
///   └── heart.shutdown           (instance's node)
///       └── routing.update(remove) (coordinator)
pub fn shutdown_tree(
    state: &MaterializedState,
    ids: &dyn BodyIdGen,
    instance_type: &str,
) -> TreePlan {
    let root_id = JobId::new(ids.next_id());
    let mut jobs = vec![spec(
        root_id.clone(),
        names::SHUTDOWN_ROOT,
        "Shut down instances and alter routing".into(),
        json!({}),
        None,
        None,
    )];

    for instance in instances_of_type(state, instance_type, &[InstanceState::Running]) {
        let shutdown_id = JobId::new(ids.next_id());
        let routing_id = JobId::new(ids.next_id());

        jobs.push(spec(
            shutdown_id.clone(),
            names::SHUTDOWN,
            format!(
                "Shutdown instance {} on node {}",
                instance.id, instance.node
            ),
            json!({ "instance": &instance }),
            Some(root_id.clone()),
            Some(instance.node.clone()),
        ));
        jobs.push(spec(
            routing_id,
            names::ROUTING_UPDATE,
            format!("Update routing for {}", instance.id),
            json!({"instance_id": instance.id.as_str(), "add": false}),
            Some(shutdown_id),
            None,
        ));
    }

    TreePlan {
        root: root_id,
        jobs,
    }
}

/// Deregister tree: one leaf per instance that is not running.
pub fn deregister_tree(
    state: &MaterializedState,
    ids: &dyn BodyIdGen,
    instance_type: &str,
) -> TreePlan {
    let root_id = JobId::new(ids.next_id());
    let mut jobs = vec![spec(
        root_id.clone(),
        names::DEREGISTER_ROOT,
        "Deregister instances".into(),
        json!({}),
        None,
        None,
    )];

    let removable = instances_of_type(
        state,
        instance_type,
        &[
            InstanceState::Registered,
            InstanceState::Stopped,
            InstanceState::Error,
        ],
    );
    for instance in removable {
        jobs.push(spec(
            JobId::new(ids.next_id()),
            names::DEREGISTER,
            format!(
                "Deregister instance {} on node {}",
                instance.id, instance.node
            ),
            json!({ "instance": &instance }),
            Some(root_id.clone()),
            Some(instance.node.clone()),
        ));
    }

    TreePlan {
        root: root_id,
        jobs,
    }
}

#[cfg(test)]
#[path = "trees_tests.rs"]
mod tests;
