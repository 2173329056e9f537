// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the control and streaming API.
//!
//! The listener accepts TCP connections without blocking the engine
//! loop. A connection is one request/response exchange, unless the
//! client upgrades it with `OpenStream`, after which it becomes the
//! framed bidirectional streaming facade.

mod control;
mod stream;

use crate::config::AuthSection;
use crate::protocol::{self, AuthMethod, Credentials, Request, Response, DEFAULT_TIMEOUT};
use pulse_core::SystemClock;
use pulse_engine::Runtime;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Runtime with the production clock.
pub type DaemonRuntime = Runtime<SystemClock>;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    pub runtime: Arc<DaemonRuntime>,
    pub auth: AuthSection,
    pub shutdown: Arc<Notify>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

/// Check credentials against the configured tokens.
///
/// Cookie sessions belong to the HTML surface, which this daemon does
/// not serve; they are rejected here.
pub(crate) fn authorize(auth: &Credentials, config: &AuthSection) -> Result<(), String> {
    let ok = match auth.method {
        AuthMethod::Super => config.super_token.as_deref() == Some(auth.value.as_str()),
        // The super token is accepted anywhere an API token is
        AuthMethod::Token => {
            config.api_tokens.iter().any(|t| t == &auth.value)
                || config.super_token.as_deref() == Some(auth.value.as_str())
        }
        AuthMethod::Node => config.node_token.as_deref() == Some(auth.value.as_str()),
        AuthMethod::Cookie => {
            return Err("cookie auth is not accepted on this channel".into())
        }
    };
    if ok {
        Ok(())
    } else {
        Err("invalid credentials".into())
    }
}

/// Listener task for accepting control connections.
pub struct Listener {
    socket: TcpListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: TcpListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Run the listener loop, spawning tasks for each connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, addr)) => {
                    debug!(%addr, "connection accepted");
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("connection timeout")
                                }
                                _ => error!("connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(stream: TcpStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    let request: Request = protocol::read_frame(&mut reader, DEFAULT_TIMEOUT).await?;

    if matches!(request, Request::Query { .. }) {
        debug!(request = ?request, "received query");
    } else {
        tracing::info!(request = ?request, "received request");
    }

    if matches!(request, Request::OpenStream) {
        protocol::write_frame(&mut writer, &Response::StreamReady).await?;
        return stream::run(reader, writer, ctx).await.map_err(Into::into);
    }

    let response = control::handle_request(request, ctx).await;
    debug!(response = ?response, "sending response");
    protocol::write_frame(&mut writer, &response).await?;
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
