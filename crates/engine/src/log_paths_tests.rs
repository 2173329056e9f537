// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn shards_by_first_two_characters() {
    let path = job_log_path(Path::new("/logs"), "ab12cd");
    assert_eq!(path, Path::new("/logs/ab/ab12cd.log"));
}

#[test]
fn short_ids_use_the_whole_id_as_shard() {
    let path = job_log_path(Path::new("/logs"), "x");
    assert_eq!(path, Path::new("/logs/x/x.log"));
}
