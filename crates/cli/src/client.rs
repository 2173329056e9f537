// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection to the pacemaker's control and streaming channels.

use anyhow::{anyhow, bail, Result};
use pulse_daemon::protocol::{
    self, AuthMethod, Credentials, Request, Response, StreamRequest,
};
use pulse_engine::StatusFrame;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// One-shot and streaming client for a pacemaker.
pub struct DaemonClient {
    remote: String,
    port: u16,
    key: String,
    super_key: bool,
}

impl DaemonClient {
    pub fn new(remote: &str, port: u16, key: &str, super_key: bool) -> Self {
        Self {
            remote: remote.to_string(),
            port,
            key: key.to_string(),
            super_key,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            method: if self.super_key {
                AuthMethod::Super
            } else {
                AuthMethod::Token
            },
            value: self.key.clone(),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = format!("{}:{}", self.remote, self.port);
        TcpStream::connect(&addr)
            .await
            .map_err(|e| anyhow!("cannot reach pacemaker at {addr}: {e}"))
    }

    /// One request/response exchange. `Error` responses become errors
    /// so every command exits non-zero on failure.
    pub async fn request(&self, request: Request) -> Result<Response> {
        let stream = self.connect().await?;
        let (mut reader, mut writer) = stream.into_split();
        protocol::write_frame(&mut writer, &request).await?;
        let response: Response =
            protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT).await?;
        match response {
            Response::Error { message } => bail!("{message}"),
            other => Ok(other),
        }
    }

    /// Upgrade a fresh connection to the streaming facade.
    pub async fn open_stream(&self) -> Result<StreamConnection> {
        let stream = self.connect().await?;
        let (mut reader, mut writer) = stream.into_split();
        protocol::write_frame(&mut writer, &Request::OpenStream).await?;
        let ready: Response =
            protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT).await?;
        if ready != Response::StreamReady {
            bail!("unexpected stream handshake: {ready:?}");
        }
        Ok(StreamConnection {
            reader,
            writer,
            sequence: 0,
            auth: Some(self.credentials()),
        })
    }
}

/// An upgraded streaming connection.
pub struct StreamConnection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    sequence: u64,
    /// Sent with the first request; the connection stays authenticated
    auth: Option<Credentials>,
}

impl StreamConnection {
    /// Send a subscription request; returns its sequence number.
    pub async fn send(&mut self, request: &str, data: serde_json::Value) -> Result<u64> {
        self.sequence += 1;
        let frame = StreamRequest {
            request: request.to_string(),
            sequence: self.sequence,
            data,
            auth: self.auth.take(),
        };
        protocol::write_frame(&mut self.writer, &frame).await?;
        Ok(self.sequence)
    }

    /// Wait for the next server frame.
    pub async fn next_frame(&mut self) -> Result<StatusFrame> {
        let bytes = protocol::read_message(&mut self.reader).await?;
        Ok(protocol::decode(&bytes)?)
    }
}
