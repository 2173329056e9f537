// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine runtime errors.

use pulse_core::JobError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("log pipe error: {0}")]
    LogPipe(#[from] std::io::Error),

    #[error("event channel closed")]
    ChannelClosed,
}
