// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heart bodies: instance lifecycle on the node that hosts it.
//!
//! Parameters embed the full instance record so these bodies need no
//! store access and run identically on remote hearts and on a
//! single-node coordinator. All of them are idempotent; the runtime
//! adapter treats repeated starts/stops as no-ops.

use crate::registry::{BodyContext, BodyOutcome, JobBody};
use async_trait::async_trait;
use pulse_core::{Context, InstanceRecord, KEY_INSTANCES};
use serde::Deserialize;
use serde_json::json;

/// Parameter schema shared by the heart bodies.
#[derive(Debug, Deserialize)]
pub struct InstanceParams {
    pub instance: InstanceRecord,
}

fn instances_fragment(instance: &InstanceRecord, state: &str) -> Context {
    [(KEY_INSTANCES, json!({ instance.id.as_str(): state }))]
        .into_iter()
        .collect()
}

/// Unpack the package, render the environment, run pre-start commands.
pub struct PreStartupBody;

#[async_trait]
impl JobBody for PreStartupBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let params: InstanceParams = match ctx.params() {
            Ok(params) => params,
            Err(e) => return BodyOutcome::failure(e),
        };
        let instance = &params.instance;
        ctx.logger
            .info(&format!("Preparing instance {}.", instance.id));

        tokio::select! {
            _ = ctx.abort.cancelled() => BodyOutcome::aborted("aborted"),
            result = ctx.adapters.runtime.prepare(instance) => match result {
                Ok(()) => BodyOutcome::Success {
                    output: Context::new(),
                    summary: format!("Prepared instance {}.", instance.id),
                },
                Err(e) => {
                    ctx.logger.error(&e.to_string());
                    BodyOutcome::failure(e.to_string())
                }
            },
        }
    }
}

/// Invoke the runtime start and observe the port in use.
pub struct StartupBody;

#[async_trait]
impl JobBody for StartupBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let params: InstanceParams = match ctx.params() {
            Ok(params) => params,
            Err(e) => return BodyOutcome::failure(e),
        };
        let instance = &params.instance;
        ctx.logger.info(&format!(
            "Starting instance {} on port {}.",
            instance.id, instance.port
        ));

        tokio::select! {
            _ = ctx.abort.cancelled() => BodyOutcome::aborted("aborted"),
            result = ctx.adapters.runtime.start(instance) => match result {
                Ok(()) => BodyOutcome::Success {
                    output: instances_fragment(instance, "running"),
                    summary: format!("Started instance {}.", instance.id),
                },
                Err(e) => {
                    ctx.logger.error(&e.to_string());
                    BodyOutcome::failure(e.to_string())
                }
            },
        }
    }
}

/// Invoke the runtime stop.
pub struct ShutdownBody;

#[async_trait]
impl JobBody for ShutdownBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let params: InstanceParams = match ctx.params() {
            Ok(params) => params,
            Err(e) => return BodyOutcome::failure(e),
        };
        let instance = &params.instance;
        ctx.logger
            .info(&format!("Shutting down instance {}.", instance.id));

        match ctx.adapters.runtime.stop(instance).await {
            Ok(()) => BodyOutcome::Success {
                output: instances_fragment(instance, "stopped"),
                summary: format!("Stopped instance {}.", instance.id),
            },
            Err(e) => {
                ctx.logger.error(&e.to_string());
                BodyOutcome::failure(e.to_string())
            }
        }
    }
}

/// Drop node-local metadata for an instance that is going away.
pub struct DeregisterBody;

#[async_trait]
impl JobBody for DeregisterBody {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome {
        let params: InstanceParams = match ctx.params() {
            Ok(params) => params,
            Err(e) => return BodyOutcome::failure(e),
        };
        let instance = &params.instance;
        ctx.logger
            .info(&format!("Deregistering instance {}.", instance.id));

        match ctx.adapters.runtime.deregister(instance).await {
            Ok(()) => BodyOutcome::Success {
                output: Context::new(),
                summary: format!("Deregistered instance {}.", instance.id),
            },
            Err(e) => BodyOutcome::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "heart_tests.rs"]
mod tests;
