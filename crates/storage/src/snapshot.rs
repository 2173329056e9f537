// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete materialized state at a point in time,
//! identified by the WAL sequence number. Recovery loads the snapshot
//! and replays WAL entries after that sequence.

use crate::MaterializedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// zstd compression level for snapshot payloads
const COMPRESSION_LEVEL: i32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// WAL sequence number at the time of snapshot
    pub seq: u64,
    /// The complete materialized state
    pub state: MaterializedState,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState) -> Self {
        Self {
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Save the snapshot atomically (write to .tmp, then rename).
    ///
    /// The payload is zstd-compressed JSON. A crash during save leaves
    /// the previous snapshot intact.
    pub fn save(&self, path: &Path) -> Result<u64, SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(&json[..], COMPRESSION_LEVEL)?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        // Fsync the directory so the rename itself is durable
        if let Some(parent) = path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(compressed.len() as u64)
    }
}

/// Load a snapshot if one exists.
///
/// Accepts both compressed and plain-JSON payloads. An unreadable
/// snapshot is rotated to `.bak` and treated as absent so the daemon can
/// still start (the WAL replays from seq 0 in that case).
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    if !path.exists() {
        return Ok(None);
    }

    let mut raw = Vec::new();
    File::open(path)?.read_to_end(&mut raw)?;

    let json = match zstd::decode_all(&raw[..]) {
        Ok(decoded) => decoded,
        // Pre-compression snapshots were plain JSON
        Err(_) => raw,
    };

    match serde_json::from_slice::<Snapshot>(&json) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            let bak = rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak.display(),
                error = %e,
                "Unreadable snapshot, rotating to .bak and starting empty",
            );
            fs::rename(path, &bak)?;
            Ok(None)
        }
    }
}

/// Path a corrupt file is rotated to before being replaced.
pub fn rotate_bak_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
