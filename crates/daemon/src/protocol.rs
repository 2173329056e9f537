// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol for the control, streaming, and node channels.
//!
//! Every channel speaks the same framing: 4-byte length prefix
//! (big-endian) + JSON payload. Control connections are one
//! request/response exchange; `OpenStream` upgrades the connection to
//! the bidirectional streaming facade; node channels are long-lived and
//! symmetric.

use pulse_core::{Context, JobId, JobRecord, JobState, Node, NodeId};
use pulse_engine::StartJob;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// How a caller authenticates a request or a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Node token (other cluster nodes)
    Node,
    /// Browser session cookie (not served by this daemon)
    Cookie,
    /// API token
    Token,
    /// Super token
    Super,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub method: AuthMethod,
    pub value: String,
}

/// Which coordinate tree to build and submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeOp {
    Register,
    Startup,
    Shutdown,
    Deregister,
}

/// Request from a client to the pacemaker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Build and submit a coordinate tree
    SubmitTree {
        op: TreeOp,
        /// Full descriptor for register; later ops resolve instances
        /// from the store by instance type
        #[serde(default, skip_serializing_if = "Option::is_none")]
        descriptor: Option<pulse_engine::TypeDescriptor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance_type: Option<String>,
        auth: Credentials,
    },

    /// Allow a submitted root to execute
    AllowExecution { root: String, auth: Credentials },

    /// Abort a job and its subtree
    AbortJob { id: String, auth: Credentials },

    /// Read state
    Query { query: Query, auth: Credentials },

    /// Upgrade this connection to the streaming facade
    OpenStream,

    /// Request daemon shutdown
    Shutdown { auth: Credentials },
}

/// Query types for reading pacemaker state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    ListJobs,
    GetJob {
        id: String,
    },
    /// Whole tree of a root, creation order
    GetTree {
        root: String,
    },
    ListNodes,
    /// Log bytes from the given offset to the tail
    GetLog {
        id: String,
        #[serde(default)]
        position: u64,
    },
}

/// Response from the pacemaker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Health check response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Daemon is shutting down
    ShuttingDown,

    /// Tree accepted; root id for arming and subscriptions
    TreeSubmitted { root: JobId },

    /// Single job
    Job { job: Option<Box<JobRecord>> },

    /// Whole tree, creation order
    Tree { jobs: Vec<JobRecord> },

    /// Job listing
    Jobs { jobs: Vec<JobSummary> },

    /// Node listing
    Nodes { nodes: Vec<Node> },

    /// Log bytes
    Log { content: String, offset: u64 },

    /// Streaming facade is ready; frames follow
    StreamReady,

    /// Error response
    Error { message: String },
}

/// Summary of a job for listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: JobId,
    pub root: JobId,
    pub body_type: String,
    pub title: String,
    pub state: JobState,
    pub time_created: u64,
}

impl From<&JobRecord> for JobSummary {
    fn from(job: &JobRecord) -> Self {
        Self {
            id: job.id.clone(),
            root: job.root.clone(),
            body_type: job.body_type.clone(),
            title: job.title.clone(),
            state: job.state,
            time_created: job.time_created,
        }
    }
}

/// Client frame on an upgraded streaming connection.
///
/// `sequence` is echoed on `error` frames so callers can correlate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamRequest {
    pub request: String,
    pub sequence: u64,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Credentials>,
}

/// Frames on the pacemaker <-> heart channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeFrame {
    /// First frame from a connecting node
    Hello { node: Node, token: String },

    /// Acknowledgement from the pacemaker
    HelloAck { coordinator: NodeId },

    Heartbeat { id: NodeId, at: u64 },

    /// Coordinator asks the node to run a body
    StartJob { job: StartJob },

    /// Cooperative abort request
    AbortJob { id: JobId },

    /// Terminal outcome from the node
    JobResult {
        id: JobId,
        state: JobState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(default)]
        output: Context,
    },

    /// Log bytes produced on the node, appended to the job's stream
    JobLog { id: JobId, lines: String },
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Maximum message size (200 MB)
pub const MAX_MESSAGE_SIZE: usize = 200 * 1024 * 1024;

/// Default control timeout (streaming connections are exempt)
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Protocol version
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encode a message to JSON bytes (without length prefix)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;

    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    Ok(json)
}

/// Decode a message from wire format
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read a length-prefixed message from an async reader
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write a length-prefixed message to an async writer
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode a typed frame with a timeout
pub async fn read_frame<T: DeserializeOwned, R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<T, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Encode and write a typed frame
pub async fn write_frame<T: Serialize, W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    frame: &T,
) -> Result<(), ProtocolError> {
    let data = encode(frame)?;
    write_message(writer, &data).await
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
