// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job body registry.
//!
//! A body is a named capability: a parameter schema (the body's typed
//! parameter struct, enforced at insertion time), a timeout, an
//! idempotence declaration, and the async entry point. Bodies report
//! exactly one terminal outcome; tree extension happens through the
//! coordinator handle before the outcome is returned.

use crate::log_pipe::JobLogHandle;
use pulse_adapters::{Placement, RoutingTable, RuntimeAdapter};
use pulse_core::{Context, Event, IdGen, JobError, JobId};
use pulse_storage::MaterializedState;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default per-job timeout; bodies may override in their registry entry.
pub const DEFAULT_BODY_TIMEOUT: Duration = Duration::from_secs(300);

/// Terminal outcome of a body run.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyOutcome {
    Success { output: Context, summary: String },
    Failure { summary: String },
    Aborted { summary: String },
}

impl BodyOutcome {
    pub fn failure(summary: impl Into<String>) -> Self {
        BodyOutcome::Failure {
            summary: summary.into(),
        }
    }

    pub fn aborted(summary: impl Into<String>) -> Self {
        BodyOutcome::Aborted {
            summary: summary.into(),
        }
    }
}

/// Adapter set bodies reach the outside world through.
pub struct Adapters {
    pub runtime: Arc<dyn RuntimeAdapter>,
    pub routing: Arc<dyn RoutingTable>,
    pub placement: Arc<dyn Placement>,
}

/// Object-safe id source for bodies that mint records.
pub trait BodyIdGen: Send + Sync {
    fn next_id(&self) -> String;
}

impl<T: IdGen> BodyIdGen for T {
    fn next_id(&self) -> String {
        self.next()
    }
}

/// Coordinator-side capabilities: store reads, event emission, and the
/// cluster identity routing keys are derived from. Absent on heart
/// nodes, where bodies work from parameters and context alone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    pub state: Arc<Mutex<MaterializedState>>,
    pub event_tx: mpsc::Sender<Event>,
    pub cluster_hostname: String,
    pub ids: Arc<dyn BodyIdGen>,
}

impl CoordinatorHandle {
    /// Emit a store event and wait for the channel to accept it.
    pub async fn emit(&self, event: Event) -> Result<(), String> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| "event channel closed".to_string())
    }
}

/// Everything a body sees when it starts.
pub struct BodyContext {
    pub job_id: JobId,
    pub parameters: serde_json::Value,
    pub context: Context,
    pub logger: JobLogHandle,
    /// Cooperative cancellation; bodies poll or select on this
    pub abort: CancellationToken,
    pub adapters: Arc<Adapters>,
    /// Present only on the coordinator
    pub coordinator: Option<CoordinatorHandle>,
}

impl BodyContext {
    /// Deserialize the typed view of this body's parameters.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, String> {
        serde_json::from_value(self.parameters.clone()).map_err(|e| e.to_string())
    }

    pub fn coordinator(&self) -> Result<&CoordinatorHandle, String> {
        self.coordinator
            .as_ref()
            .ok_or_else(|| "body requires the coordinator".to_string())
    }
}

/// A registered job body.
#[async_trait]
pub trait JobBody: Send + Sync {
    async fn start(&self, ctx: BodyContext) -> BodyOutcome;
}

/// Registry entry: the body plus its declared behavior.
pub struct BodyEntry {
    body: Arc<dyn JobBody>,
    timeout: Duration,
    idempotent: bool,
    validate: fn(&serde_json::Value) -> Result<(), String>,
}

fn validate_as<T: DeserializeOwned>(value: &serde_json::Value) -> Result<(), String> {
    serde_json::from_value::<T>(value.clone())
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Catalog of named job bodies.
#[derive(Default)]
pub struct Registry {
    bodies: HashMap<String, BodyEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body under its interned name.
    pub fn register<T: DeserializeOwned>(
        &mut self,
        name: &str,
        body: Arc<dyn JobBody>,
        timeout: Option<Duration>,
        idempotent: bool,
    ) {
        self.bodies.insert(
            name.to_string(),
            BodyEntry {
                body,
                timeout: timeout.unwrap_or(DEFAULT_BODY_TIMEOUT),
                idempotent,
                validate: validate_as::<T>,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    pub fn body(&self, name: &str) -> Result<Arc<dyn JobBody>, JobError> {
        self.bodies
            .get(name)
            .map(|entry| Arc::clone(&entry.body))
            .ok_or_else(|| JobError::UnknownBody(name.to_string()))
    }

    /// Timeout for a body type (default when the body is unknown, so a
    /// stale in-flight entry still expires).
    pub fn timeout(&self, name: &str) -> Duration {
        self.bodies
            .get(name)
            .map(|entry| entry.timeout)
            .unwrap_or(DEFAULT_BODY_TIMEOUT)
    }

    pub fn is_idempotent(&self, name: &str) -> bool {
        self.bodies
            .get(name)
            .map(|entry| entry.idempotent)
            .unwrap_or(false)
    }

    /// Validate parameters against the body's schema at insertion time.
    pub fn validate(&self, name: &str, parameters: &serde_json::Value) -> Result<(), JobError> {
        let entry = self
            .bodies
            .get(name)
            .ok_or_else(|| JobError::UnknownBody(name.to_string()))?;
        (entry.validate)(parameters).map_err(|detail| JobError::SchemaInvalid {
            body_type: name.to_string(),
            detail,
        })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
