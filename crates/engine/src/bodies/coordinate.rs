// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinate bodies: the pacemaker-side pivots and planners.
//!
//! Root pivots are noops whose trees do the work; their own run is the
//! last step of the operation. `register_request` asks placement which
//! hearts can host the type; `select_locations` allocates ports and
//! persists instance records, all-or-nothing.

use crate::registry::{BodyContext, BodyOutcome, JobBody};
use crate::trees::TypeDescriptor;
use async_trait::async_trait;
use pulse_core::{Context, Event, InstanceId, InstanceRecord, InstanceState, KEY_INSTANCES, NodeId};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

/// Port range instances are allocated from.
pub const PORT_RANGE: std::ops::RangeInclusive<u16> = 42600..=42699;

/// Noop pivot; the summary is the user-visible result line.
pub struct PivotBody {
    pub summary: &'static str,
}

#[async_trait]
impl JobBody for PivotBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        ctx.logger.info(self.summary);
        BodyOutcome::Success {
            output: Context::new(),
            summary: self.summary.to_string(),
        }
    }
}

/// Parameters for `register_request`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequestParams {
    pub instance_type: String,
    pub runtime: String,
    pub runtime_version: String,
}

/// Ask the placement plugin which hearts will run the type.
pub struct RegisterRequestBody;

#[async_trait]
impl JobBody for RegisterRequestBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let params: RegisterRequestParams = match ctx.params() {
            Ok(params) => params,
            Err(e) => return BodyOutcome::failure(e),
        };
        let coordinator = match ctx.coordinator() {
            Ok(coordinator) => coordinator,
            Err(e) => return BodyOutcome::failure(e),
        };

        let nodes: Vec<_> = {
            let state = coordinator.state.lock();
            state.nodes.values().cloned().collect()
        };

        ctx.logger.info(&format!(
            "Requesting placement for instance type {}.",
            params.instance_type
        ));

        match ctx
            .adapters
            .placement
            .select(&nodes, &params.runtime, &params.runtime_version)
            .await
        {
            Ok(candidates) => {
                let names: Vec<_> =
                    candidates.iter().map(|id| id.as_str().to_string()).collect();
                ctx.logger
                    .info(&format!("Placement selected nodes: {}.", names.join(", ")));
                BodyOutcome::Success {
                    output: [("candidate_nodes", json!(names))].into_iter().collect(),
                    summary: format!("Found {} candidate node(s).", names.len()),
                }
            }
            Err(e) => {
                ctx.logger.error(&e.to_string());
                BodyOutcome::failure(e.to_string())
            }
        }
    }
}

/// Allocate ports and persist instance records as `registered`.
///
/// Instance rows are only written once every allocation has succeeded
/// and the body has not been asked to abort, so an aborted selection
/// leaves no rows behind.
pub struct SelectLocationsBody;

#[async_trait]
impl JobBody for SelectLocationsBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let descriptor: TypeDescriptor = match ctx.params() {
            Ok(descriptor) => descriptor,
            Err(e) => return BodyOutcome::failure(e),
        };
        let coordinator = match ctx.coordinator() {
            Ok(coordinator) => coordinator.clone(),
            Err(e) => return BodyOutcome::failure(e),
        };

        let candidates: Vec<NodeId> = match ctx.context.get("candidate_nodes") {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(candidates) => candidates,
                Err(e) => {
                    return BodyOutcome::failure(format!("bad candidate_nodes: {e}"))
                }
            },
            None => return BodyOutcome::failure("no candidate_nodes in context"),
        };
        if candidates.is_empty() {
            return BodyOutcome::failure("no candidate nodes to place on");
        }

        ctx.logger.info(&format!(
            "Selecting locations for {} instance(s) of type {}.",
            descriptor.count, descriptor.instance_type
        ));

        // Plan every instance before persisting any of them
        let mut planned: Vec<InstanceRecord> = Vec::new();
        {
            let state = coordinator.state.lock();
            let mut used: HashSet<(String, u16)> = state
                .instances
                .values()
                .map(|i| (i.node.as_str().to_string(), i.port))
                .collect();

            for index in 0..descriptor.count {
                let node = candidates[index % candidates.len()].clone();
                let port = PORT_RANGE
                    .clone()
                    .find(|port| !used.contains(&(node.as_str().to_string(), *port)));
                let Some(port) = port else {
                    return BodyOutcome::failure(format!(
                        "no free port on node {node} in {}..={}",
                        PORT_RANGE.start(),
                        PORT_RANGE.end()
                    ));
                };
                used.insert((node.as_str().to_string(), port));

                planned.push(InstanceRecord {
                    id: InstanceId::new(coordinator.ids.next_id()),
                    instance_type: descriptor.instance_type.clone(),
                    node,
                    port,
                    state: InstanceState::Registered,
                    hostnames: descriptor.hostnames.clone(),
                    version: descriptor.version.clone(),
                    launch_command: descriptor.launch_command.clone(),
                });
            }
        }

        // An abort received before the commit point means no rows at all
        if ctx.abort.is_cancelled() {
            return BodyOutcome::aborted("aborted");
        }

        let mut instances = serde_json::Map::new();
        for instance in planned {
            ctx.logger.info(&format!(
                "Placing instance {} on node {} port {}.",
                instance.id, instance.node, instance.port
            ));
            instances.insert(instance.id.as_str().to_string(), json!("registered"));
            if let Err(e) = coordinator
                .emit(Event::InstanceCreated { instance })
                .await
            {
                return BodyOutcome::failure(e.to_string());
            }
        }

        BodyOutcome::Success {
            output: [(KEY_INSTANCES, json!(instances))].into_iter().collect(),
            summary: format!("Registered {} instance(s).", instances.len()),
        }
    }
}

/// Register the coordinate bodies.
pub fn register(registry: &mut crate::registry::Registry) {
    registry.register::<Context>(
        super::names::REGISTER_ROOT,
        Arc::new(PivotBody {
            summary: "Selected and registered instances.",
        }),
        None,
        false,
    );
    registry.register::<Context>(
        super::names::STARTUP_ROOT,
        Arc::new(PivotBody {
            summary: "Started up instances and altered routing.",
        }),
        None,
        false,
    );
    registry.register::<Context>(
        super::names::SHUTDOWN_ROOT,
        Arc::new(PivotBody {
            summary: "Stopped instances and altered routing.",
        }),
        None,
        false,
    );
    registry.register::<Context>(
        super::names::DEREGISTER_ROOT,
        Arc::new(PivotBody {
            summary: "Deregistered instances.",
        }),
        None,
        false,
    );
    registry.register::<RegisterRequestParams>(
        super::names::REGISTER_REQUEST,
        Arc::new(RegisterRequestBody),
        None,
        false,
    );
    registry.register::<TypeDescriptor>(
        super::names::SELECT_LOCATIONS,
        Arc::new(SelectLocationsBody),
        None,
        false,
    );
}

#[cfg(test)]
#[path = "coordinate_tests.rs"]
mod tests;
