// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn pipe() -> (Arc<LogPipe>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (Arc::new(LogPipe::new(dir.path().to_path_buf())), dir)
}

#[test]
fn offsets_are_monotone_across_appends() {
    let (pipe, _dir) = pipe();
    let a = pipe.append_line("job-1", "first").unwrap();
    let b = pipe.append_line("job-1", "second").unwrap();
    assert!(b > a);
    assert_eq!(pipe.offset("job-1"), b);
}

// An earlier observation of the stream is a prefix of a later one.
#[test]
fn earlier_reads_are_prefixes_of_later_reads() {
    let (pipe, _dir) = pipe();
    pipe.append_line("job-1", "alpha").unwrap();
    let early = pipe.read_from("job-1", 0).unwrap();

    pipe.append_line("job-1", "beta").unwrap();
    let late = pipe.read_from("job-1", 0).unwrap();

    assert!(late.lines.starts_with(&early.lines));
    assert!(late.offset > early.offset);
}

#[test]
fn read_from_tail_returns_empty_chunk() {
    let (pipe, _dir) = pipe();
    let offset = pipe.append_line("job-1", "only").unwrap();
    let chunk = pipe.read_from("job-1", offset).unwrap();
    assert!(chunk.lines.is_empty());
    assert_eq!(chunk.offset, offset);
}

#[test]
fn subscriber_from_zero_gets_backlog_then_live_lines() {
    let (pipe, _dir) = pipe();
    pipe.append_line("job-1", "old").unwrap();

    let mut rx = pipe.subscribe("job-1", 0);
    let backlog = rx.try_recv().unwrap();
    assert!(backlog.lines.contains("old"));

    pipe.append_line("job-1", "new").unwrap();
    let live = rx.try_recv().unwrap();
    assert!(live.lines.contains("new"));
    assert_eq!(live.offset, pipe.offset("job-1"));
}

// Scenario: one subscriber resumes mid-stream, another replays from 0
// after completion; both see the same total byte stream.
#[test]
fn resume_from_offset_receives_exactly_the_tail() {
    let (pipe, _dir) = pipe();
    let mid = pipe.append_line("job-1", "head").unwrap();
    pipe.append_line("job-1", "tail-1").unwrap();
    pipe.append_line("job-1", "tail-2").unwrap();

    let resumed = pipe.read_from("job-1", mid).unwrap();
    assert!(!resumed.lines.contains("head"));
    assert!(resumed.lines.contains("tail-1"));
    assert!(resumed.lines.contains("tail-2"));

    let full = pipe.read_from("job-1", 0).unwrap();
    assert_eq!(full.offset, resumed.offset);
    assert!(full.lines.ends_with(&resumed.lines));
}

#[test]
fn streams_of_different_jobs_are_independent() {
    let (pipe, _dir) = pipe();
    pipe.append_line("job-1", "one").unwrap();
    pipe.append_line("job-2", "two").unwrap();

    assert!(pipe.read_from("job-1", 0).unwrap().lines.contains("one"));
    assert!(!pipe.read_from("job-2", 0).unwrap().lines.contains("one"));
}

#[test]
fn handle_writes_through_the_pipe() {
    let (pipe, _dir) = pipe();
    let handle = pipe.handle(&JobId::new("job-9"));
    handle.info("from handle");
    handle.error("went wrong");

    let chunk = pipe.read_from("job-9", 0).unwrap();
    assert!(chunk.lines.contains("from handle"));
    assert!(chunk.lines.contains("ERROR went wrong"));
    assert_eq!(handle.offset(), chunk.offset);
}
