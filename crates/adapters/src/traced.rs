// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing wrappers for adapters.
//!
//! Wrap any adapter to get structured logs of every call and its
//! latency without the adapters themselves knowing about logging.

use crate::routing::{RoutingError, RoutingTable};
use crate::runtime::{RuntimeAdapter, RuntimeAdapterError};
use async_trait::async_trait;
use pulse_core::InstanceRecord;
use std::time::Instant;
use tracing::{error, info};

/// Runtime adapter wrapper that logs each operation.
#[derive(Clone)]
pub struct TracedRuntime<R> {
    inner: R,
}

impl<R> TracedRuntime<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: RuntimeAdapter> TracedRuntime<R> {
    async fn traced<F>(
        &self,
        op: &'static str,
        instance: &InstanceRecord,
        fut: F,
    ) -> Result<(), RuntimeAdapterError>
    where
        F: std::future::Future<Output = Result<(), RuntimeAdapterError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => info!(op, instance = %instance.id, elapsed_ms, "runtime op completed"),
            Err(e) => error!(op, instance = %instance.id, elapsed_ms, error = %e, "runtime op failed"),
        }
        result
    }
}

#[async_trait]
impl<R: RuntimeAdapter> RuntimeAdapter for TracedRuntime<R> {
    async fn prepare(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.traced("prepare", instance, self.inner.prepare(instance))
            .await
    }

    async fn start(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.traced("start", instance, self.inner.start(instance))
            .await
    }

    async fn stop(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.traced("stop", instance, self.inner.stop(instance))
            .await
    }

    async fn deregister(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.traced("deregister", instance, self.inner.deregister(instance))
            .await
    }
}

/// Routing table wrapper that logs each mutation.
#[derive(Clone)]
pub struct TracedRouting<T> {
    inner: T,
}

impl<T> TracedRouting<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<T: RoutingTable> RoutingTable for TracedRouting<T> {
    async fn add(&self, set: &str, member: &str) -> Result<(), RoutingError> {
        let result = self.inner.add(set, member).await;
        match &result {
            Ok(()) => info!(set, member, "routing add"),
            Err(e) => error!(set, member, error = %e, "routing add failed"),
        }
        result
    }

    async fn remove(&self, set: &str, member: &str) -> Result<(), RoutingError> {
        let result = self.inner.remove(set, member).await;
        match &result {
            Ok(()) => info!(set, member, "routing remove"),
            Err(e) => error!(set, member, error = %e, "routing remove failed"),
        }
        result
    }

    async fn members(&self, set: &str) -> Result<Vec<String>, RoutingError> {
        self.inner.members(set).await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
