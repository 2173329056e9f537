// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by this crate's tests and downstream test suites.

use crate::context::Context;
use crate::id::{InstanceId, JobId, NodeId};
use crate::instance::{InstanceRecord, InstanceState};
use crate::job::{JobRecord, JobSpec, JobState};
use crate::node::{Node, NodeRole, NodeState};
use serde_json::json;

/// A minimal job record in state `New` with a noop body type.
pub fn job(id: &str, parent: Option<&str>) -> JobRecord {
    let spec = JobSpec {
        id: JobId::new(id),
        body_type: "pulse.job.coordinate.register_root".into(),
        title: format!("job {id}"),
        parameters: json!({}),
        parent: parent.map(JobId::new),
        node: None,
        context: Context::new(),
    };
    let root = JobId::new(parent.unwrap_or(id));
    JobRecord::from_spec(spec, root, 1)
}

/// A job record driven into the given state via legal transitions.
pub fn job_in_state(id: &str, parent: Option<&str>, state: JobState) -> JobRecord {
    let mut record = job(id, parent);
    let path: &[JobState] = match state {
        JobState::New => &[],
        JobState::Waiting => &[JobState::Waiting],
        JobState::Running => &[JobState::Waiting, JobState::Running],
        JobState::Success => &[JobState::Waiting, JobState::Running, JobState::Success],
        JobState::Failed => &[JobState::Waiting, JobState::Running, JobState::Failed],
        JobState::Aborted => &[JobState::Aborted],
    };
    for (i, step) in path.iter().enumerate() {
        #[allow(clippy::unwrap_used)]
        record.transition(*step, None, 10 + i as u64).unwrap();
    }
    record
}

/// An active heart node advertising the shell runtime.
pub fn heart_node(id: &str) -> Node {
    Node {
        id: NodeId::new(id),
        route: format!("{id}.cluster.test"),
        port: 42500,
        roles: vec![NodeRole::Heart],
        tags: json!({"runtimes": {"shell": ["1"]}}),
        state: NodeState::Active,
        last_heard: 0,
    }
}

/// A registered instance on the given node.
pub fn instance(id: &str, node: &str, port: u16) -> InstanceRecord {
    InstanceRecord {
        id: InstanceId::new(id),
        instance_type: "type-1".into(),
        node: NodeId::new(node),
        port,
        state: InstanceState::Registered,
        hostnames: vec!["foo.com".into()],
        version: "1".into(),
        launch_command: "python app.py --port=%(port)d".into(),
    }
}
