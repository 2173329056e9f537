// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pulse_core::test_support::heart_node;
use pulse_core::Event;

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let mut state = MaterializedState::default();
    state.apply_event(&Event::NodeRegistered {
        node: heart_node("n-1"),
    });

    let snapshot = Snapshot::new(7, state);
    let size = snapshot.save(&path).unwrap();
    assert!(size > 0);

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 7);
    assert!(loaded.state.nodes.contains_key("n-1"));
}

#[test]
fn missing_snapshot_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("nope.json"))
        .unwrap()
        .is_none());
}

#[test]
fn plain_json_snapshot_still_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let snapshot = Snapshot::new(3, MaterializedState::default());
    std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 3);
}

#[test]
fn unreadable_snapshot_is_rotated_and_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, b"not a snapshot").unwrap();

    assert!(load_snapshot(&path).unwrap().is_none());
    assert!(!path.exists());
    assert!(rotate_bak_path(&path).exists());
}

#[test]
fn bak_path_appends_extension() {
    let path = Path::new("/state/snapshot.json");
    assert_eq!(
        rotate_bak_path(path),
        Path::new("/state/snapshot.json.bak")
    );
}

#[test]
fn save_overwrites_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    Snapshot::new(1, MaterializedState::default())
        .save(&path)
        .unwrap();
    Snapshot::new(2, MaterializedState::default())
        .save(&path)
        .unwrap();

    assert_eq!(load_snapshot(&path).unwrap().unwrap().seq, 2);
}
