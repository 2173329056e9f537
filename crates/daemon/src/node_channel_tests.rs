// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::write_frame;
use pulse_core::test_support::heart_node;
use pulse_core::Context;
use pulse_storage::Wal;

fn bus(dir: &tempfile::TempDir) -> EventBus {
    let wal = Wal::open(&dir.path().join("events.wal"), 0).unwrap();
    EventBus::new(wal).0
}

fn ctx(dir: &tempfile::TempDir, token: Option<&str>) -> Arc<NodeChannelCtx> {
    Arc::new(NodeChannelCtx {
        registry: Arc::new(ChannelRegistry::new()),
        event_bus: bus(dir),
        log_pipe: Arc::new(LogPipe::new(dir.path().join("logs"))),
        state: Arc::new(parking_lot::Mutex::new(Default::default())),
        coordinator: NodeId::new("coord"),
        node_token: token.map(String::from),
    })
}

#[tokio::test]
async fn registry_without_channel_is_unreachable() {
    let registry = ChannelRegistry::new();
    let err = registry
        .start_job(
            &NodeId::new("n-1"),
            StartJob {
                id: JobId::new("j-1"),
                body_type: "pulse.job.heart.startup".into(),
                parameters: serde_json::json!({}),
                context: Context::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unreachable"));
}

#[tokio::test]
async fn hello_registers_the_node_and_acks() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(&dir, Some("n0de"));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_ctx = Arc::clone(&ctx);
    tokio::spawn(async move { serve(listener, serve_ctx).await });

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    write_frame(
        &mut writer,
        &NodeFrame::Hello {
            node: heart_node("n-1"),
            token: "n0de".into(),
        },
    )
    .await
    .unwrap();

    let ack: NodeFrame = protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(
        ack,
        NodeFrame::HelloAck {
            coordinator: NodeId::new("coord")
        }
    );

    // The channel is now addressable through the registry
    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        loop {
            if ctx.registry.connected().contains(&NodeId::new("n-1")) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn bad_node_token_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(&dir, Some("right"));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_ctx = Arc::clone(&ctx);
    tokio::spawn(async move { serve(listener, serve_ctx).await });

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    write_frame(
        &mut writer,
        &NodeFrame::Hello {
            node: heart_node("n-1"),
            token: "wrong".into(),
        },
    )
    .await
    .unwrap();

    // The server hangs up without an ack
    let result: Result<NodeFrame, _> =
        protocol::read_frame(&mut reader, std::time::Duration::from_millis(500)).await;
    assert!(result.is_err());
    assert!(ctx.registry.connected().is_empty());
}

#[tokio::test]
async fn start_job_flows_to_the_connected_node() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(&dir, None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_ctx = Arc::clone(&ctx);
    tokio::spawn(async move { serve(listener, serve_ctx).await });

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    write_frame(
        &mut writer,
        &NodeFrame::Hello {
            node: heart_node("n-1"),
            token: String::new(),
        },
    )
    .await
    .unwrap();
    let _ack: NodeFrame = protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();

    // Wait for registration, then dispatch through the registry
    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while ctx.registry.connected().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    ctx.registry
        .start_job(
            &NodeId::new("n-1"),
            StartJob {
                id: JobId::new("j-1"),
                body_type: "pulse.job.heart.startup".into(),
                parameters: serde_json::json!({}),
                context: Context::new(),
            },
        )
        .await
        .unwrap();

    let frame: NodeFrame = protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    match frame {
        NodeFrame::StartJob { job } => assert_eq!(job.id, JobId::new("j-1")),
        other => panic!("unexpected frame: {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_node_with_conflicting_route_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(&dir, None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_ctx = Arc::clone(&ctx);
    tokio::spawn(async move { serve(listener, serve_ctx).await });

    // First node connects and registers
    let first = TcpStream::connect(addr).await.unwrap();
    let (mut first_reader, mut first_writer) = first.into_split();
    write_frame(
        &mut first_writer,
        &NodeFrame::Hello {
            node: heart_node("n-1"),
            token: String::new(),
        },
    )
    .await
    .unwrap();
    let _ack: NodeFrame = protocol::read_frame(&mut first_reader, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();
    // Mirror what the engine loop does with the registration event
    ctx.state.lock().apply_event(&Event::NodeRegistered {
        node: heart_node("n-1"),
    });
    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while ctx.registry.connected().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    // Same uuid, different route, while the first is still connected
    let mut imposter = heart_node("n-1");
    imposter.route = "evil.example".into();
    let second = TcpStream::connect(addr).await.unwrap();
    let (mut second_reader, mut second_writer) = second.into_split();
    write_frame(
        &mut second_writer,
        &NodeFrame::Hello {
            node: imposter,
            token: String::new(),
        },
    )
    .await
    .unwrap();

    let result: Result<NodeFrame, _> =
        protocol::read_frame(&mut second_reader, std::time::Duration::from_millis(500)).await;
    assert!(result.is_err(), "duplicate node must not be acked");
}

#[tokio::test]
async fn remote_log_bytes_land_in_the_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(&dir, None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_ctx = Arc::clone(&ctx);
    tokio::spawn(async move { serve(listener, serve_ctx).await });

    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut reader, mut writer) = stream.into_split();
    write_frame(
        &mut writer,
        &NodeFrame::Hello {
            node: heart_node("n-1"),
            token: String::new(),
        },
    )
    .await
    .unwrap();
    let _ack: NodeFrame = protocol::read_frame(&mut reader, protocol::DEFAULT_TIMEOUT)
        .await
        .unwrap();

    write_frame(
        &mut writer,
        &NodeFrame::JobLog {
            id: JobId::new("job-7"),
            lines: "2026-01-01T00:00:00Z starting\n".into(),
        },
    )
    .await
    .unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(1), async {
        loop {
            let chunk = ctx.log_pipe.read_from("job-7", 0).unwrap();
            if chunk.lines.contains("starting") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
