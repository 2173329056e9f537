// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime adapter: lifecycle of application instance processes.
//!
//! The heart bodies call through this trait; the shell implementation
//! spawns real subprocesses, the fake records calls for tests. All
//! operations are idempotent so a redelivered dispatch never
//! double-applies (starting a running instance and stopping a stopped
//! one are both no-ops).

mod shell;

pub use shell::ShellRuntime;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeRuntime;

use async_trait::async_trait;
use pulse_core::InstanceRecord;
use thiserror::Error;

/// Errors from runtime operations
#[derive(Debug, Error)]
pub enum RuntimeAdapterError {
    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("instance {0} never started listening on port {1}")]
    PortNotListening(String, u16),

    #[error("pre-start command failed: {0}")]
    PreStart(String),

    #[error("stop failed: {0}")]
    Stop(String),
}

/// Lifecycle operations for application instances on a heart node.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    /// Unpack the package and run pre-start commands.
    async fn prepare(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError>;

    /// Start the instance and observe its port in use.
    async fn start(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError>;

    /// Stop the instance.
    async fn stop(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError>;

    /// Drop node-local metadata for a deregistered instance.
    async fn deregister(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError>;
}
