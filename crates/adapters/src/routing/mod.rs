// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing table: set membership the router data plane serves from.
//!
//! Keys are `instances_<version>.<hostname>.<cluster>` sets whose
//! members are `host:port` strings. Add/remove are commutative set
//! operations, so ordering between unrelated routing jobs is irrelevant
//! and redelivery is harmless.

mod memory;
mod redis;

pub use self::redis::RedisRoutingTable;
pub use memory::MemoryRoutingTable;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing backend error: {0}")]
    Backend(String),
}

/// Shared KV set the pacemaker mutates and routers read.
#[async_trait]
pub trait RoutingTable: Send + Sync {
    async fn add(&self, set: &str, member: &str) -> Result<(), RoutingError>;
    async fn remove(&self, set: &str, member: &str) -> Result<(), RoutingError>;
    async fn members(&self, set: &str) -> Result<Vec<String>, RoutingError>;
}

/// Routing set key for one version of one hostname.
pub fn instance_set_key(version: &str, hostname: &str, cluster: &str) -> String {
    format!("instances_{version}.{hostname}.{cluster}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_key_shape() {
        assert_eq!(
            instance_set_key("1", "foo.com", "local.cluster"),
            "instances_1.foo.com.local.cluster"
        );
    }
}
