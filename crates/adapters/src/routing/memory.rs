// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory routing table for tests and single-node setups.

use super::{RoutingError, RoutingTable};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryRoutingTable {
    sets: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
}

impl MemoryRoutingTable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoutingTable for MemoryRoutingTable {
    async fn add(&self, set: &str, member: &str) -> Result<(), RoutingError> {
        self.sets
            .lock()
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove(&self, set: &str, member: &str) -> Result<(), RoutingError> {
        if let Some(members) = self.sets.lock().get_mut(set) {
            members.remove(member);
        }
        Ok(())
    }

    async fn members(&self, set: &str) -> Result<Vec<String>, RoutingError> {
        Ok(self
            .sets
            .lock()
            .get(set)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
