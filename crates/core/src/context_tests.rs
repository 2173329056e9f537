// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use serde_json::json;

fn ctx(pairs: &[(&str, Value)]) -> Context {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

#[test]
fn later_writer_wins_on_conflict() {
    let mut base = ctx(&[("port", json!(42600))]);
    base.merge(&ctx(&[("port", json!(42601))]));
    assert_eq!(base.get("port"), Some(&json!(42601)));
}

#[test]
fn merge_keeps_unrelated_keys() {
    let mut base = ctx(&[("a", json!(1))]);
    base.merge(&ctx(&[("b", json!(2))]));
    assert_eq!(base.get("a"), Some(&json!(1)));
    assert_eq!(base.get("b"), Some(&json!(2)));
}

#[test]
fn instances_key_unions_per_instance() {
    let mut base = ctx(&[(KEY_INSTANCES, json!({"i-1": "running"}))]);
    base.merge(&ctx(&[(KEY_INSTANCES, json!({"i-2": "running"}))]));

    let mut ids = base.instance_ids();
    ids.sort();
    assert_eq!(ids, vec!["i-1", "i-2"]);
}

#[test]
fn instances_key_later_state_wins_per_instance() {
    let mut base = ctx(&[(KEY_INSTANCES, json!({"i-1": "registered"}))]);
    base.merge(&ctx(&[(KEY_INSTANCES, json!({"i-1": "running"}))]));
    assert_eq!(
        base.get(KEY_INSTANCES),
        Some(&json!({"i-1": "running"}))
    );
}

#[test]
fn non_object_instances_falls_back_to_overwrite() {
    let mut base = ctx(&[(KEY_INSTANCES, json!({"i-1": "running"}))]);
    base.merge(&ctx(&[(KEY_INSTANCES, json!("bogus"))]));
    assert_eq!(base.get(KEY_INSTANCES), Some(&json!("bogus")));
}

#[test]
fn typed_reads() {
    let base = ctx(&[("name", json!("web")), ("count", json!(3))]);
    assert_eq!(base.get_str("name"), Some("web"));
    assert_eq!(base.get_str("count"), None);
    assert!(base.instance_ids().is_empty());
}

// Sibling outputs with disjoint keys merge to the same result
// regardless of finish order.
proptest! {
    #[test]
    fn disjoint_merges_commute(
        a in proptest::collection::btree_map("[a-m]{1,6}", 0i64..100, 0..6),
        b in proptest::collection::btree_map("[n-z]{1,6}", 0i64..100, 0..6),
    ) {
        let a: Context = a.into_iter().map(|(k, v)| (k, json!(v))).collect();
        let b: Context = b.into_iter().map(|(k, v)| (k, json!(v))).collect();

        let mut ab = Context::new();
        ab.merge(&a);
        ab.merge(&b);

        let mut ba = Context::new();
        ba.merge(&b);
        ba.merge(&a);

        for (key, value) in ab.iter() {
            prop_assert_eq!(ba.get(key), Some(value));
        }
        prop_assert_eq!(ab.len(), ba.len());
    }
}
