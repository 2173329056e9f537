// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::instance_set_key;
use super::*;

// Repeated add is idempotent; add then remove yields absence.
#[tokio::test]
async fn add_is_idempotent() {
    let table = MemoryRoutingTable::new();
    let key = instance_set_key("1", "foo.com", "test");

    table.add(&key, "10.0.0.1:42600").await.unwrap();
    table.add(&key, "10.0.0.1:42600").await.unwrap();

    assert_eq!(table.members(&key).await.unwrap(), vec!["10.0.0.1:42600"]);
}

#[tokio::test]
async fn add_then_remove_yields_absence() {
    let table = MemoryRoutingTable::new();
    let key = instance_set_key("1", "foo.com", "test");

    table.add(&key, "10.0.0.1:42600").await.unwrap();
    table.remove(&key, "10.0.0.1:42600").await.unwrap();

    assert!(table.members(&key).await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_of_absent_member_is_a_noop() {
    let table = MemoryRoutingTable::new();
    table.remove("instances_1.foo.com.test", "gone:1").await.unwrap();
    assert!(table
        .members("instances_1.foo.com.test")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn sets_are_independent() {
    let table = MemoryRoutingTable::new();
    table.add("a", "x:1").await.unwrap();
    table.add("b", "y:2").await.unwrap();

    assert_eq!(table.members("a").await.unwrap(), vec!["x:1"]);
    assert_eq!(table.members("b").await.unwrap(), vec!["y:2"]);
}
