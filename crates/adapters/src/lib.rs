// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pulse-adapters: opaque capabilities invoked by job bodies.
//!
//! Bodies never talk to processes, redis, or placement policy directly;
//! they go through the traits here so the engine can run against fakes
//! in tests and traced implementations in production.

pub mod placement;
pub mod routing;
pub mod runtime;
pub mod subprocess;
pub mod traced;

pub use placement::{DefaultPlacement, Placement, PlacementError};
pub use routing::{
    instance_set_key, MemoryRoutingTable, RedisRoutingTable, RoutingError, RoutingTable,
};
pub use runtime::{RuntimeAdapter, RuntimeAdapterError, ShellRuntime};
pub use traced::{TracedRouting, TracedRuntime};

#[cfg(any(test, feature = "test-support"))]
pub use runtime::FakeRuntime;
