// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pulse-storage: durable event log, snapshots, and the materialized
//! job store rebuilt by replay.

mod checkpoint;
mod snapshot;
mod state;
mod wal;

pub use checkpoint::{CheckpointError, CheckpointResult, Checkpointer};
pub use snapshot::{load_snapshot, rotate_bak_path, Snapshot, SnapshotError};
pub use state::MaterializedState;
pub use wal::{Wal, WalEntry, WalError};
