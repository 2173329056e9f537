// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accumulated job context.
//!
//! A context is the output mapping that flows from succeeded descendants
//! to their ancestors. It is an ordered shallow map: merges happen in
//! child finish order and the later writer wins per key, except for the
//! reserved `instances` key which accumulates union-style so parallel
//! heart jobs across nodes can each report their own instances.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved key whose object value merges per instance id instead of
/// being overwritten wholesale.
pub const KEY_INSTANCES: &str = "instances";

/// Ordered shallow map of accumulated job output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(IndexMap<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Shallow-merge `fragment` into this context.
    ///
    /// Keys from `fragment` overwrite existing keys; the `instances` key
    /// is special-cased to merge its object entries per instance id.
    pub fn merge(&mut self, fragment: &Context) {
        for (key, value) in &fragment.0 {
            if key == KEY_INSTANCES {
                self.merge_instances(value);
            } else {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    fn merge_instances(&mut self, incoming: &Value) {
        let Some(incoming) = incoming.as_object() else {
            // Non-object payloads fall back to plain overwrite.
            self.0.insert(KEY_INSTANCES.to_string(), incoming.clone());
            return;
        };
        let slot = self
            .0
            .entry(KEY_INSTANCES.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        if !slot.is_object() {
            *slot = Value::Object(Default::default());
        }
        if let Some(existing) = slot.as_object_mut() {
            for (id, state) in incoming {
                existing.insert(id.clone(), state.clone());
            }
        }
    }

    /// String-typed read used by bodies that expect a scalar key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Instance ids reported under the reserved `instances` key.
    pub fn instance_ids(&self) -> Vec<String> {
        self.0
            .get(KEY_INSTANCES)
            .and_then(Value::as_object)
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
