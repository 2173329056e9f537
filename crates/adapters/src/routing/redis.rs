// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed routing table (SADD/SREM/SMEMBERS).

use super::{RoutingError, RoutingTable};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Production routing table on a shared redis the routers also read.
///
/// Uses a `ConnectionManager` so reconnects after a redis restart are
/// transparent to callers.
#[derive(Clone)]
pub struct RedisRoutingTable {
    manager: ConnectionManager,
}

impl RedisRoutingTable {
    pub async fn connect(url: &str) -> Result<Self, RoutingError> {
        let client =
            redis::Client::open(url).map_err(|e| RoutingError::Backend(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| RoutingError::Backend(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl RoutingTable for RedisRoutingTable {
    async fn add(&self, set: &str, member: &str) -> Result<(), RoutingError> {
        let mut conn = self.manager.clone();
        conn.sadd::<_, _, ()>(set, member)
            .await
            .map_err(|e| RoutingError::Backend(e.to_string()))
    }

    async fn remove(&self, set: &str, member: &str) -> Result<(), RoutingError> {
        let mut conn = self.manager.clone();
        conn.srem::<_, _, ()>(set, member)
            .await
            .map_err(|e| RoutingError::Backend(e.to_string()))
    }

    async fn members(&self, set: &str) -> Result<Vec<String>, RoutingError> {
        let mut conn = self.manager.clone();
        conn.smembers::<_, Vec<String>>(set)
            .await
            .map_err(|e| RoutingError::Backend(e.to_string()))
    }
}
