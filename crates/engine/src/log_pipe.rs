// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job append-only log streams with offset-indexed tailing.
//!
//! Every job owns one log file; appends go through a single writer per
//! job so byte order is total. Subscribers express interest as
//! `(job_id, from_offset)`: they first receive the backlog from disk,
//! then live chunks as lines are appended. Completed jobs can still be
//! replayed from any offset. Rotation is not performed here.

use crate::log_paths;
use parking_lot::Mutex;
use pulse_core::JobId;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// A chunk of log bytes plus the stream offset after them.
#[derive(Debug, Clone, PartialEq)]
pub struct LogChunk {
    pub lines: String,
    pub offset: u64,
}

#[derive(Default)]
struct JobLogState {
    /// Tail offset; lazily initialized from the file length
    offset: Option<u64>,
    subscribers: Vec<mpsc::UnboundedSender<LogChunk>>,
}

/// Fan-out writer/reader over the per-job log files.
pub struct LogPipe {
    log_dir: PathBuf,
    jobs: Mutex<HashMap<String, JobLogState>>,
}

impl LogPipe {
    pub fn new(log_dir: PathBuf) -> Self {
        Self {
            log_dir,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_dir(&self) -> &std::path::Path {
        &self.log_dir
    }

    /// A cheap handle bodies use to write their own stream.
    pub fn handle(self: &Arc<Self>, job: &JobId) -> JobLogHandle {
        JobLogHandle {
            pipe: Arc::clone(self),
            job: job.clone(),
        }
    }

    fn file_len(&self, job: &str) -> u64 {
        log_paths::job_log_path(&self.log_dir, job)
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Current tail offset of a job's stream.
    pub fn offset(&self, job: &str) -> u64 {
        let mut jobs = self.jobs.lock();
        let state = jobs.entry(job.to_string()).or_default();
        match state.offset {
            Some(offset) => offset,
            None => {
                let len = self.file_len(job);
                state.offset = Some(len);
                len
            }
        }
    }

    /// Append one line to a job's stream, stamped with the UTC time.
    ///
    /// Returns the new tail offset. The line is pushed to live
    /// subscribers after it is durable in the file.
    pub fn append_line(&self, job: &str, line: &str) -> std::io::Result<u64> {
        let stamped = format!(
            "{} {}\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            line
        );
        self.append_raw(job, &stamped)
    }

    /// Append pre-formatted bytes (already stamped by the producing
    /// node) to a job's stream.
    pub fn append_raw(&self, job: &str, chunk: &str) -> std::io::Result<u64> {
        if chunk.is_empty() {
            return Ok(self.offset(job));
        }
        let path = log_paths::job_log_path(&self.log_dir, job);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut jobs = self.jobs.lock();
        let state = jobs.entry(job.to_string()).or_default();
        let base = match state.offset {
            Some(offset) => offset,
            None => self.file_len(job),
        };

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(chunk.as_bytes())?;

        let offset = base + chunk.len() as u64;
        state.offset = Some(offset);

        let live = LogChunk {
            lines: chunk.to_string(),
            offset,
        };
        state
            .subscribers
            .retain(|tx| tx.send(live.clone()).is_ok());

        Ok(offset)
    }

    /// Read the stream from `from_offset` to the current tail.
    pub fn read_from(&self, job: &str, from_offset: u64) -> std::io::Result<LogChunk> {
        let path = log_paths::job_log_path(&self.log_dir, job);
        if !path.exists() {
            return Ok(LogChunk {
                lines: String::new(),
                offset: from_offset,
            });
        }
        let mut file = std::fs::File::open(&path)?;
        let len = file.metadata()?.len();
        if from_offset >= len {
            return Ok(LogChunk {
                lines: String::new(),
                offset: len.max(from_offset),
            });
        }
        file.seek(SeekFrom::Start(from_offset))?;
        let mut lines = String::new();
        file.read_to_string(&mut lines)?;
        Ok(LogChunk { lines, offset: len })
    }

    /// Subscribe to a job's stream from the given offset.
    ///
    /// The backlog between `from_offset` and the tail is delivered as
    /// the first chunk; subsequent appends arrive live.
    pub fn subscribe(
        &self,
        job: &str,
        from_offset: u64,
    ) -> mpsc::UnboundedReceiver<LogChunk> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut jobs = self.jobs.lock();
        let state = jobs.entry(job.to_string()).or_default();

        match self.read_from(job, from_offset) {
            Ok(backlog) => {
                if !backlog.lines.is_empty() || backlog.offset != from_offset {
                    let _ = tx.send(backlog);
                }
            }
            Err(e) => warn!(job, error = %e, "failed to read log backlog"),
        }

        state.subscribers.push(tx);
        rx
    }
}

/// Write handle for one job's stream.
#[derive(Clone)]
pub struct JobLogHandle {
    pipe: Arc<LogPipe>,
    job: JobId,
}

impl JobLogHandle {
    pub fn job(&self) -> &JobId {
        &self.job
    }

    /// Append an info line. Logging must not break the body; failures
    /// are traced and dropped.
    pub fn info(&self, message: &str) {
        if let Err(e) = self.pipe.append_line(self.job.as_str(), message) {
            warn!(job = %self.job, error = %e, "failed to write job log");
        }
    }

    pub fn error(&self, message: &str) {
        self.info(&format!("ERROR {message}"));
    }

    pub fn offset(&self) -> u64 {
        self.pipe.offset(self.job.as_str())
    }
}

#[cfg(test)]
#[path = "log_pipe_tests.rs"]
mod tests;
