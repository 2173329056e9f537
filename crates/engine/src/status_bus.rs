// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status bus: typed state-transition fanout.
//!
//! Subscriptions are keyed by root id (all descendants' events) or by
//! job id (single job). Delivery is best-effort in-order per topic;
//! there is no backlog beyond the store, so reconnecting subscribers
//! rebuild from a `tree` frame.

use parking_lot::Mutex;
use pulse_core::{JobId, JobRecord, JobState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Frames published to subscribers. The same shapes travel the
/// streaming API, so they serialize with a lowercase `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusFrame {
    /// A job was added to a subscribed tree
    New {
        id: JobId,
        root: JobId,
        tree: Vec<JobRecord>,
    },
    /// Full snapshot of a tree (sent on subscribe and on request)
    Tree { root: JobId, jobs: Vec<JobRecord> },
    /// A job changed state
    Status {
        id: JobId,
        root: JobId,
        state: JobState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        at: u64,
    },
    /// Acknowledgement of a subscription
    Subscribed { root: JobId },
    /// Log bytes for a subscribed job stream
    Lines {
        id: JobId,
        lines: String,
        offset: u64,
    },
    /// Request-scoped error; echoes the originating sequence
    Error { sequence: u64, error: String },
}

#[derive(Default)]
struct Topics {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<StatusFrame>>>,
}

/// Publishes job status frames to root- and job-keyed subscribers.
#[derive(Default)]
pub struct StatusBus {
    topics: Mutex<Topics>,
}

fn root_topic(root: &str) -> String {
    format!("root:{root}")
}

fn job_topic(id: &str) -> String {
    format!("job:{id}")
}

impl StatusBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event of a tree. The `subscribed` frame is the
    /// first delivery.
    pub fn subscribe_root(&self, root: &JobId) -> mpsc::UnboundedReceiver<StatusFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(StatusFrame::Subscribed { root: root.clone() });
        self.topics
            .lock()
            .subscribers
            .entry(root_topic(root.as_str()))
            .or_default()
            .push(tx);
        rx
    }

    /// Subscribe to a single job's events.
    pub fn subscribe_job(&self, id: &JobId) -> mpsc::UnboundedReceiver<StatusFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .subscribers
            .entry(job_topic(id.as_str()))
            .or_default()
            .push(tx);
        rx
    }

    fn publish_to(&self, topic: &str, frame: &StatusFrame) {
        let mut topics = self.topics.lock();
        if let Some(subscribers) = topics.subscribers.get_mut(topic) {
            subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
            if subscribers.is_empty() {
                topics.subscribers.remove(topic);
            }
        }
    }

    /// Publish a state transition to the job topic and its root topic.
    pub fn publish_status(
        &self,
        id: &JobId,
        root: &JobId,
        state: JobState,
        summary: Option<String>,
        at: u64,
    ) {
        let frame = StatusFrame::Status {
            id: id.clone(),
            root: root.clone(),
            state,
            summary,
            at,
        };
        self.publish_to(&job_topic(id.as_str()), &frame);
        self.publish_to(&root_topic(root.as_str()), &frame);
    }

    /// Publish a new-job frame with the current tree snapshot.
    pub fn publish_new_job(&self, id: &JobId, root: &JobId, tree: Vec<JobRecord>) {
        let frame = StatusFrame::New {
            id: id.clone(),
            root: root.clone(),
            tree,
        };
        self.publish_to(&root_topic(root.as_str()), &frame);
    }

    /// Publish a full tree snapshot to the root topic.
    pub fn publish_tree(&self, root: &JobId, jobs: Vec<JobRecord>) {
        let frame = StatusFrame::Tree {
            root: root.clone(),
            jobs,
        };
        self.publish_to(&root_topic(root.as_str()), &frame);
    }
}

#[cfg(test)]
#[path = "status_bus_tests.rs"]
mod tests;
