// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing body: mutate the router's set membership for one instance.
//!
//! Set adds and removes are commutative, so unrelated routing jobs can
//! run in any order and a redelivered update is harmless.

use crate::registry::{BodyContext, BodyOutcome, JobBody};
use async_trait::async_trait;
use pulse_adapters::instance_set_key;
use pulse_core::Context;
use serde::Deserialize;
use std::sync::Arc;

/// Parameters for `routing.update`.
#[derive(Debug, Deserialize)]
pub struct RoutingUpdateParams {
    pub instance_id: String,
    /// true adds the instance to the table, false removes it
    pub add: bool,
}

/// Add or remove an instance's `host:port` for all of its hostnames.
pub struct RoutingUpdateBody;

#[async_trait]
impl JobBody for RoutingUpdateBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let params: RoutingUpdateParams = match ctx.params() {
            Ok(params) => params,
            Err(e) => return BodyOutcome::failure(e),
        };
        let coordinator = match ctx.coordinator() {
            Ok(coordinator) => coordinator,
            Err(e) => return BodyOutcome::failure(e),
        };

        // Resolve the instance and its node's route from the store
        let (instance, route) = {
            let state = coordinator.state.lock();
            let Some(instance) = state.instances.get(&params.instance_id).cloned() else {
                return BodyOutcome::failure(format!(
                    "unknown instance {}",
                    params.instance_id
                ));
            };
            let Some(node) = state.nodes.get(instance.node.as_str()) else {
                return BodyOutcome::failure(format!("unknown node {}", instance.node));
            };
            let route = node.route.clone();
            (instance, route)
        };

        let member = format!("{}:{}", route, instance.port);
        let verb = if params.add { "add" } else { "remove" };

        for hostname in &instance.hostnames {
            let key = instance_set_key(&instance.version, hostname, &coordinator.cluster_hostname);
            ctx.logger
                .info(&format!("Routing {verb}: {member} in {key}."));
            let result = if params.add {
                ctx.adapters.routing.add(&key, &member).await
            } else {
                ctx.adapters.routing.remove(&key, &member).await
            };
            if let Err(e) = result {
                ctx.logger.error(&e.to_string());
                return BodyOutcome::failure(e.to_string());
            }
        }

        BodyOutcome::Success {
            output: Context::new(),
            summary: format!(
                "Updated routing ({verb}) for instance {}.",
                params.instance_id
            ),
        }
    }
}

/// Register the routing body.
pub fn register(registry: &mut crate::registry::Registry) {
    registry.register::<RoutingUpdateParams>(
        super::names::ROUTING_UPDATE,
        Arc::new(RoutingUpdateBody),
        None,
        true,
    );
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
