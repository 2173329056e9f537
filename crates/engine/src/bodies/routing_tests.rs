// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::BodyFixture;
use pulse_adapters::RoutingTable;
use pulse_core::test_support::{heart_node, instance};
use pulse_core::Event;
use serde_json::json;

const SET_KEY: &str = "instances_1.foo.com.local.cluster";

fn fixture_with_instance() -> BodyFixture {
    let fixture = BodyFixture::new();
    fixture.apply(&Event::NodeRegistered {
        node: heart_node("n-1"),
    });
    fixture.apply(&Event::InstanceCreated {
        instance: instance("i-1", "n-1", 42600),
    });
    fixture
}

#[tokio::test]
async fn add_inserts_host_port_for_every_hostname() {
    let fixture = fixture_with_instance();
    let outcome = RoutingUpdateBody
        .start(fixture.ctx(
            "j-1",
            json!({"instance_id": "i-1", "add": true}),
            Default::default(),
        ))
        .await;

    assert!(matches!(outcome, BodyOutcome::Success { .. }));
    assert_eq!(
        fixture.routing.members(SET_KEY).await.unwrap(),
        vec!["n-1.cluster.test:42600"]
    );
}

#[tokio::test]
async fn remove_clears_the_membership() {
    let fixture = fixture_with_instance();
    fixture
        .routing
        .add(SET_KEY, "n-1.cluster.test:42600")
        .await
        .unwrap();

    RoutingUpdateBody
        .start(fixture.ctx(
            "j-1",
            json!({"instance_id": "i-1", "add": false}),
            Default::default(),
        ))
        .await;

    assert!(fixture.routing.members(SET_KEY).await.unwrap().is_empty());
}

// Applying the same add twice equals applying it once.
#[tokio::test]
async fn add_is_idempotent_across_redelivery() {
    let fixture = fixture_with_instance();
    for _ in 0..2 {
        RoutingUpdateBody
            .start(fixture.ctx(
                "j-1",
                json!({"instance_id": "i-1", "add": true}),
                Default::default(),
            ))
            .await;
    }
    assert_eq!(fixture.routing.members(SET_KEY).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_instance_fails() {
    let fixture = BodyFixture::new();
    let outcome = RoutingUpdateBody
        .start(fixture.ctx(
            "j-1",
            json!({"instance_id": "ghost", "add": true}),
            Default::default(),
        ))
        .await;
    assert!(matches!(outcome, BodyOutcome::Failure { .. }));
}
