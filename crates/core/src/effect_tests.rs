// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn timer_duration_serializes_as_millis() {
    let effect = Effect::SetTimer {
        id: TimerId::new("deadline:j-1"),
        duration: Duration::from_secs(300),
    };
    let value = serde_json::to_value(&effect).unwrap();
    assert_eq!(value["SetTimer"]["duration"], 300_000);

    let back: Effect = serde_json::from_value(value).unwrap();
    assert_eq!(back, effect);
}

#[test]
fn fields_include_dispatch_target() {
    let effect = Effect::DispatchRemote {
        id: JobId::new("j-1"),
        node: NodeId::new("n-1"),
    };
    assert_eq!(effect.name(), "dispatch_remote");
    let fields = effect.fields();
    assert!(fields.contains(&("job_id", "j-1".to_string())));
    assert!(fields.contains(&("node_id", "n-1".to_string())));
}
