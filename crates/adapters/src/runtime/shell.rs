// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell runtime: instances as plain subprocesses.

use super::{RuntimeAdapter, RuntimeAdapterError};
use crate::subprocess::{render_launch_command, run_with_timeout, PORT_WAIT_TIMEOUT, PRE_START_TIMEOUT};
use async_trait::async_trait;
use parking_lot::Mutex;
use pulse_core::InstanceRecord;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Runs instances as `bash -c` subprocesses in a per-instance directory.
pub struct ShellRuntime {
    /// Root under which per-instance working directories are created
    instances_dir: PathBuf,
    children: Mutex<HashMap<String, Child>>,
}

impl ShellRuntime {
    pub fn new(instances_dir: PathBuf) -> Self {
        Self {
            instances_dir,
            children: Mutex::new(HashMap::new()),
        }
    }

    fn instance_dir(&self, instance: &InstanceRecord) -> PathBuf {
        self.instances_dir.join(instance.id.as_str())
    }

    async fn port_is_listening(port: u16) -> bool {
        TcpStream::connect(("127.0.0.1", port)).await.is_ok()
    }

    /// Poll the instance port until it accepts connections.
    async fn wait_for_port(port: u16) -> bool {
        let deadline = tokio::time::Instant::now() + PORT_WAIT_TIMEOUT;
        loop {
            if Self::port_is_listening(port).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

#[async_trait]
impl RuntimeAdapter for ShellRuntime {
    async fn prepare(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        let dir = self.instance_dir(instance);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RuntimeAdapterError::PreStart(e.to_string()))?;

        // Render the environment file the launch command can source
        let env = format!("PORT={}\n", instance.port);
        tokio::fs::write(dir.join(".env"), env)
            .await
            .map_err(|e| RuntimeAdapterError::PreStart(e.to_string()))?;
        Ok(())
    }

    async fn start(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        // Idempotent: a retried dispatch must not spawn a second process
        if Self::port_is_listening(instance.port).await {
            info!(instance = %instance.id, port = instance.port, "instance already listening");
            return Ok(());
        }

        let command = render_launch_command(&instance.launch_command, instance.port);
        let dir = self.instance_dir(instance);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RuntimeAdapterError::Spawn(e.to_string()))?;

        info!(instance = %instance.id, %command, "starting instance");
        let wrapped = format!("set -euo pipefail\n{command}");
        let child = Command::new("bash")
            .arg("-c")
            .arg(&wrapped)
            .current_dir(&dir)
            .env("PORT", instance.port.to_string())
            .spawn()
            .map_err(|e| RuntimeAdapterError::Spawn(e.to_string()))?;

        self.children
            .lock()
            .insert(instance.id.as_str().to_string(), child);

        if !Self::wait_for_port(instance.port).await {
            // Reap the child so a half-started process does not linger
            if let Some(mut child) = self.children.lock().remove(instance.id.as_str()) {
                let _ = child.start_kill();
            }
            return Err(RuntimeAdapterError::PortNotListening(
                instance.id.as_str().to_string(),
                instance.port,
            ));
        }
        Ok(())
    }

    async fn stop(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        let child = self.children.lock().remove(instance.id.as_str());
        match child {
            Some(mut child) => {
                info!(instance = %instance.id, "stopping instance");
                child
                    .kill()
                    .await
                    .map_err(|e| RuntimeAdapterError::Stop(e.to_string()))?;
            }
            // Idempotent: already stopped, or started by a previous
            // process generation we no longer own
            None => {
                if Self::port_is_listening(instance.port).await {
                    warn!(
                        instance = %instance.id,
                        port = instance.port,
                        "instance listening but not owned; leaving to the operator"
                    );
                }
            }
        }
        Ok(())
    }

    async fn deregister(&self, instance: &InstanceRecord) -> Result<(), RuntimeAdapterError> {
        let dir = self.instance_dir(instance);
        if dir.exists() {
            let mut cmd = Command::new("rm");
            cmd.arg("-rf").arg(&dir);
            run_with_timeout(cmd, PRE_START_TIMEOUT, "instance cleanup")
                .await
                .map_err(RuntimeAdapterError::Stop)?;
        }
        Ok(())
    }
}
