// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake runtime adapter recording calls for tests.

use super::{RuntimeAdapter, RuntimeAdapterError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pulse_core::InstanceRecord;
use std::sync::Arc;

/// A recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Prepare(String),
    Start(String),
    Stop(String),
    Deregister(String),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<RuntimeCall>,
    fail_start: Option<String>,
    hang_start: bool,
}

/// Records calls; optionally fails or hangs `start` to drive failure and
/// timeout paths in engine tests.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `start` calls fail with the given message.
    pub fn fail_start(&self, message: impl Into<String>) {
        self.state.lock().fail_start = Some(message.into());
    }

    /// Make subsequent `start` calls never complete (for timeout tests).
    pub fn hang_start(&self) {
        self.state.lock().hang_start = true;
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().calls.clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Start(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Stop(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RuntimeAdapter for FakeRuntime {
    async fn prepare(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.state
            .lock()
            .calls
            .push(RuntimeCall::Prepare(instance.id.as_str().to_string()));
        Ok(())
    }

    async fn start(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        let (fail, hang) = {
            let mut state = self.state.lock();
            state
                .calls
                .push(RuntimeCall::Start(instance.id.as_str().to_string()));
            (state.fail_start.clone(), state.hang_start)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(message) = fail {
            return Err(RuntimeAdapterError::Spawn(message));
        }
        Ok(())
    }

    async fn stop(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.state
            .lock()
            .calls
            .push(RuntimeCall::Stop(instance.id.as_str().to_string()));
        Ok(())
    }

    async fn deregister(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        self.state
            .lock()
            .calls
            .push(RuntimeCall::Deregister(instance.id.as_str().to_string()));
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
