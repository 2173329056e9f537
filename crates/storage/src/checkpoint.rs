// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic checkpointing of the materialized state.
//!
//! A checkpoint saves a snapshot and reports the sequence it covers so
//! the caller can truncate the WAL. The invariant: the snapshot must be
//! durable before any WAL entry at or below its sequence is dropped.

use crate::{MaterializedState, Snapshot, SnapshotError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// How many processed entries may accumulate before a checkpoint is due.
pub const CHECKPOINT_EVERY: u64 = 1_000;

/// Errors from checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result of a completed checkpoint
#[derive(Debug, Clone)]
pub struct CheckpointResult {
    /// Sequence number that was checkpointed
    pub seq: u64,
    /// Size of the compressed snapshot in bytes
    pub size_bytes: u64,
}

/// Writes snapshots for crash recovery.
pub struct Checkpointer {
    snapshot_path: PathBuf,
    /// Sequence covered by the last checkpoint
    last_seq: u64,
}

impl Checkpointer {
    pub fn new(snapshot_path: PathBuf) -> Self {
        Self {
            snapshot_path,
            last_seq: 0,
        }
    }

    /// Whether enough entries have been processed since the last
    /// checkpoint to justify another.
    pub fn is_due(&self, processed_seq: u64) -> bool {
        processed_seq >= self.last_seq + CHECKPOINT_EVERY
    }

    /// Save a snapshot at the given sequence synchronously.
    ///
    /// After this returns the caller may truncate the WAL up to `seq`.
    pub fn checkpoint_sync(
        &mut self,
        seq: u64,
        state: &MaterializedState,
    ) -> Result<CheckpointResult, CheckpointError> {
        let snapshot = Snapshot::new(seq, state.clone());
        let size_bytes = snapshot.save(&self.snapshot_path)?;
        self.last_seq = seq;
        info!(seq, size_bytes, "checkpoint saved");
        Ok(CheckpointResult { seq, size_bytes })
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
