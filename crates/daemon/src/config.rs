// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (TOML).

use pulse_core::NodeRole;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

fn default_route() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    42500
}

fn default_node_port() -> u16 {
    42510
}

fn default_node_cap() -> usize {
    4
}

fn default_heartbeat_grace_secs() -> u64 {
    30
}

fn default_heartbeat_period_secs() -> u64 {
    10
}

fn default_cluster_hostname() -> String {
    "local.cluster".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// Stable node uuid; generated and persisted on first start when absent
    #[serde(default)]
    pub uuid: Option<String>,
    /// Address other nodes and routers reach this node at
    #[serde(default = "default_route")]
    pub route: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub roles: Vec<NodeRole>,
    #[serde(default = "default_cluster_hostname")]
    pub cluster_hostname: String,
    /// Capability tags advertised to placement
    #[serde(default)]
    pub tags: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PacemakerSection {
    /// Node channel listener port
    #[serde(default = "default_node_port")]
    pub node_port: u16,
    /// Redis the router data plane reads; in-memory table when absent
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_node_cap")]
    pub node_cap: usize,
    #[serde(default = "default_heartbeat_grace_secs")]
    pub heartbeat_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct HeartSection {
    /// Pacemaker node channel address, e.g. "127.0.0.1:42510"
    #[serde(default)]
    pub pacemaker_addr: Option<String>,
    #[serde(default = "default_heartbeat_period_secs")]
    pub heartbeat_period_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthSection {
    #[serde(default)]
    pub super_token: Option<String>,
    #[serde(default)]
    pub api_tokens: Vec<String>,
    #[serde(default)]
    pub node_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub node: NodeSection,
    #[serde(default)]
    pub pacemaker: PacemakerSection,
    #[serde(default)]
    pub heart: HeartSection,
    #[serde(default)]
    pub auth: AuthSection,
    /// Root state directory (WAL, snapshot, logs, lock file)
    pub state_dir: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn has_role(&self, role: NodeRole) -> bool {
        self.node.roles.contains(&role)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.state_dir.join("wal").join("events.wal")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.state_dir.join("snapshot.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join("pulsed.pid")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn daemon_log_path(&self) -> PathBuf {
        self.state_dir.join("pulsed.log")
    }

    pub fn node_uuid_path(&self) -> PathBuf {
        self.state_dir.join("node.uuid")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.state_dir.join("instances")
    }

    /// Resolve the node uuid: config value, persisted value, or a fresh
    /// uuid written for next time.
    pub fn resolve_node_uuid(&self) -> std::io::Result<String> {
        if let Some(uuid) = &self.node.uuid {
            return Ok(uuid.clone());
        }
        let path = self.node_uuid_path();
        if let Ok(existing) = std::fs::read_to_string(&path) {
            let trimmed = existing.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }
        let fresh = uuid::Uuid::new_v4().to_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &fresh)?;
        Ok(fresh)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
