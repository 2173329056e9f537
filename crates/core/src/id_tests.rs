// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn short_truncates_long_ids() {
    let id = JobId::new("abcdef123456");
    assert_eq!(id.short(6), "abcdef");
}

#[test]
fn short_returns_whole_id_when_short_enough() {
    let id = JobId::new("abc");
    assert_eq!(id.short(8), "abc");
}

#[test]
fn ids_compare_against_str() {
    let id = NodeId::new("node-1");
    assert_eq!(id, "node-1");
    assert_ne!(id, "node-2");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    assert_ne!(gen.next(), gen.next());
}

#[test]
fn sequential_gen_counts_up() {
    let gen = SequentialIdGen::new("job");
    assert_eq!(gen.next(), "job-1");
    assert_eq!(gen.next(), "job-2");
    let clone = gen.clone();
    assert_eq!(clone.next(), "job-3");
}
