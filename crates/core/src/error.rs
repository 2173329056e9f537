// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain errors for job creation and state transitions.

use crate::id::JobId;
use crate::job::JobState;
use thiserror::Error;

/// Errors surfaced by the store and registry.
///
/// Input errors (`UnknownBody`, `SchemaInvalid`, `ParentTerminal`,
/// `DuplicateNode`) are returned to the caller and never transition a
/// job. Invariant violations (`IllegalTransition`, `CycleDetected`) are
/// logged with the offending tree and fail it to prevent deadlock.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unknown job body: {0}")]
    UnknownBody(String),

    #[error("parameters for {body_type} do not match its schema: {detail}")]
    SchemaInvalid { body_type: String, detail: String },

    #[error("parent job {0} already has a terminal state")]
    ParentTerminal(JobId),

    #[error("node {0} is already registered with a different route")]
    DuplicateNode(String),

    #[error("illegal transition for {id}: {from} -> {to}")]
    IllegalTransition {
        id: JobId,
        from: JobState,
        to: JobState,
    },

    #[error("cycle detected at job {0}")]
    CycleDetected(JobId),

    #[error("job not found: {0}")]
    NotFound(JobId),
}
