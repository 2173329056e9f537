// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn render_replaces_port_placeholder() {
    assert_eq!(
        render_launch_command("python app.py --port=%(port)d", 42600),
        "python app.py --port=42600"
    );
}

#[test]
fn render_without_placeholder_is_unchanged() {
    assert_eq!(render_launch_command("./server", 42600), "./server");
}

#[tokio::test]
async fn run_with_timeout_captures_output() {
    let mut cmd = Command::new("echo");
    cmd.arg("hello");
    let output = run_with_timeout(cmd, Duration::from_secs(5), "echo")
        .await
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn run_with_timeout_reports_expiry() {
    let mut cmd = Command::new("sleep");
    cmd.arg("5");
    let err = run_with_timeout(cmd, Duration::from_millis(50), "sleep")
        .await
        .unwrap_err();
    assert!(err.contains("timed out"), "{err}");
}
