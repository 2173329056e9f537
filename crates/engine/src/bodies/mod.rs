// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registered job bodies.
//!
//! The coordinator registers everything; hearts register only the
//! bodies that run node-side plus routing (which stays coordinator-only
//! in practice because routing jobs carry no node affinity).

pub mod coordinate;
pub mod heart;
pub mod routing;

use crate::registry::Registry;
use std::sync::Arc;

/// Interned body type names.
pub mod names {
    pub const REGISTER_ROOT: &str = "pulse.job.coordinate.register_root";
    pub const REGISTER_REQUEST: &str = "pulse.job.coordinate.register_request";
    pub const SELECT_LOCATIONS: &str = "pulse.job.coordinate.select_locations";
    pub const STARTUP_ROOT: &str = "pulse.job.coordinate.startup_root";
    pub const SHUTDOWN_ROOT: &str = "pulse.job.coordinate.shutdown_root";
    pub const DEREGISTER_ROOT: &str = "pulse.job.coordinate.deregister_root";
    pub const PRE_STARTUP: &str = "pulse.job.heart.pre_startup";
    pub const STARTUP: &str = "pulse.job.heart.startup";
    pub const SHUTDOWN: &str = "pulse.job.heart.shutdown";
    pub const DEREGISTER: &str = "pulse.job.heart.deregister";
    pub const ROUTING_UPDATE: &str = "pulse.job.routing.update";
}

/// Registry for a pacemaker node: every body.
pub fn coordinator_registry() -> Registry {
    let mut registry = heart_registry();
    coordinate::register(&mut registry);
    routing::register(&mut registry);
    registry
}

/// Registry for a heart node: instance lifecycle bodies only.
pub fn heart_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register::<heart::InstanceParams>(
        names::PRE_STARTUP,
        Arc::new(heart::PreStartupBody),
        None,
        true,
    );
    registry.register::<heart::InstanceParams>(
        names::STARTUP,
        Arc::new(heart::StartupBody),
        None,
        true,
    );
    registry.register::<heart::InstanceParams>(
        names::SHUTDOWN,
        Arc::new(heart::ShutdownBody),
        None,
        true,
    );
    registry.register::<heart::InstanceParams>(
        names::DEREGISTER,
        Arc::new(heart::DeregisterBody),
        None,
        true,
    );
    registry
}
