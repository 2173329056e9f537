// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer identifiers.
//!
//! Timer ids are structured strings so the owning subsystem can be
//! recovered from the id alone: `deadline:<job>`, `retry:<job>`,
//! `heartbeat-scan`.

crate::define_id! {
    /// Identifier for a scheduled timer.
    pub struct TimerId;
}

impl TimerId {
    pub fn deadline(job: &crate::id::JobId) -> Self {
        Self::new(format!("deadline:{job}"))
    }

    pub fn retry(job: &crate::id::JobId) -> Self {
        Self::new(format!("retry:{job}"))
    }

    pub fn heartbeat_scan() -> Self {
        Self::new("heartbeat-scan")
    }

    /// Job id embedded in a `deadline:`/`retry:` timer id.
    pub fn job_suffix(&self, prefix: &str) -> Option<crate::id::JobId> {
        self.as_str()
            .strip_prefix(prefix)
            .map(crate::id::JobId::new)
    }
}
