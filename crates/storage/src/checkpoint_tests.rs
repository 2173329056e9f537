// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::load_snapshot;

#[test]
fn checkpoint_writes_loadable_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let mut checkpointer = Checkpointer::new(path.clone());

    let result = checkpointer
        .checkpoint_sync(42, &MaterializedState::default())
        .unwrap();
    assert_eq!(result.seq, 42);

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 42);
}

#[test]
fn is_due_tracks_the_last_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let mut checkpointer = Checkpointer::new(dir.path().join("snapshot.json"));

    assert!(!checkpointer.is_due(CHECKPOINT_EVERY - 1));
    assert!(checkpointer.is_due(CHECKPOINT_EVERY));

    checkpointer
        .checkpoint_sync(CHECKPOINT_EVERY, &MaterializedState::default())
        .unwrap();
    assert!(!checkpointer.is_due(CHECKPOINT_EVERY + 1));
    assert!(checkpointer.is_due(CHECKPOINT_EVERY * 2));
}
