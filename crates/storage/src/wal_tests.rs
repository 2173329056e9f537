// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pulse_core::{JobId, JobState};
use std::io::Write as _;

fn status_event(id: &str, state: JobState) -> Event {
    Event::JobStatus {
        id: JobId::new(id),
        state,
        summary: None,
        at: 1,
        log_offset: None,
    }
}

fn wal_in(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("events.wal")
}

#[test]
fn append_assigns_increasing_sequence_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_in(&dir), 0).unwrap();

    let a = wal.append(&status_event("j-1", JobState::Waiting)).unwrap();
    let b = wal.append(&status_event("j-1", JobState::Running)).unwrap();
    assert_eq!((a, b), (1, 2));
}

#[test]
fn reopen_resumes_sequence_after_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_in(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&status_event("j-1", JobState::Waiting)).unwrap();
        wal.append(&status_event("j-1", JobState::Running)).unwrap();
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 2);
    let next = wal.append(&status_event("j-1", JobState::Success)).unwrap();
    assert_eq!(next, 3);
}

#[test]
fn next_unprocessed_walks_entries_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_in(&dir), 0).unwrap();

    wal.append(&status_event("j-1", JobState::Waiting)).unwrap();
    wal.append(&status_event("j-2", JobState::Waiting)).unwrap();

    let first = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(first.seq, 1);
    wal.mark_processed(first.seq);

    let second = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(second.seq, 2);
    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn open_skips_entries_at_or_below_processed_seq() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_in(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        for i in 0..3 {
            wal.append(&status_event(&format!("j-{i}"), JobState::Waiting))
                .unwrap();
        }
        wal.flush().unwrap();
    }

    let mut wal = Wal::open(&path, 2).unwrap();
    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 3);
}

#[test]
fn entries_after_returns_replay_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_in(&dir), 0).unwrap();

    for i in 0..5 {
        wal.append(&status_event(&format!("j-{i}"), JobState::Waiting))
            .unwrap();
    }
    wal.flush().unwrap();

    let entries = wal.entries_after(3).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 4);
    assert_eq!(entries[1].seq, 5);
}

#[test]
fn truncate_before_drops_old_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&wal_in(&dir), 0).unwrap();

    for i in 0..4 {
        let seq = wal
            .append(&status_event(&format!("j-{i}"), JobState::Waiting))
            .unwrap();
        wal.mark_processed(seq);
    }
    wal.truncate_before(3).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].seq, 3);
}

#[test]
fn corrupt_tail_is_rotated_keeping_valid_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_in(&dir);

    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&status_event("j-1", JobState::Waiting)).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap();
        writeln!(file, "{{\"seq\": not json").unwrap();
    }

    let wal = Wal::open(&path, 0).unwrap();
    assert_eq!(wal.write_seq(), 1);
    assert_eq!(wal.entries_after(0).unwrap().len(), 1);
    assert!(crate::snapshot::rotate_bak_path(&path).exists());
}

#[test]
fn unknown_event_types_survive_replay_as_custom() {
    let dir = tempfile::tempdir().unwrap();
    let path = wal_in(&dir);

    std::fs::write(
        &path,
        "{\"seq\":1,\"event\":{\"type\":\"job:mystery\",\"id\":\"x\"}}\n",
    )
    .unwrap();

    let wal = Wal::open(&path, 0).unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event, Event::Custom);
}
