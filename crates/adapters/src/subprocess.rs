// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for instance pre-start commands.
pub const PRE_START_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for instance stop commands.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for a started instance to begin listening.
pub const PORT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child
/// process is killed automatically if the timeout elapses (via the
/// tokio `Child` drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Substitute the `%(port)d` placeholder in a launch command template.
pub fn render_launch_command(template: &str, port: u16) -> String {
    template.replace("%(port)d", &port.to_string())
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
