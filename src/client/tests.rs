use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::SinkExt;
use tokio::net::TcpListener;
use tokio_util::codec::{FramedWrite, LinesCodec};

use super::*;
use crate::engine::engine_channel;
use crate::output::OutputDescriptor;
use crate::testing::{EngineCall, MockEngine};
use crate::types::MediaRef;

async fn stream_engine() -> MockEngine {
    let (tx, _rx) = engine_channel();
    let engine = MockEngine::new(tx);
    engine
        .load(&MediaRef::new("rtp://@:8234"), &OutputDescriptor::default())
        .await
        .unwrap();
    engine.clear_calls().await;
    engine
}

/// Accept one connection and write `lines` to it
async fn serve_lines(lines: Vec<String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut sink = FramedWrite::new(stream, LinesCodec::new());
        for line in lines {
            sink.send(line).await.unwrap();
        }
    });

    address
}

#[tokio::test]
async fn test_next_notification_skips_garbage() {
    let server = serve_lines(vec![
        "hello".to_string(),
        r#"{"type":"bogus"}"#.to_string(),
        r#"{"type":"volume","percent":20}"#.to_string(),
    ])
    .await;

    let mut client = ControlClient::connect(server).await.unwrap();

    assert_eq!(
        client.next_notification().await,
        Some(Notification::Volume { percent: 20 })
    );
    assert_eq!(client.next_notification().await, None);
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);

    let err = ControlClient::connect(address).await.err().unwrap();
    assert!(matches!(err, PartyBoxError::ConnectionFailed { .. }));
}

#[tokio::test]
async fn test_run_applies_notifications() {
    let server = serve_lines(vec![
        Notification::Volume { percent: 35 }.encode().unwrap(),
        Notification::Restart.encode().unwrap(),
        Notification::OutputReconfigured {
            descriptor: OutputDescriptor::default(),
        }
        .encode()
        .unwrap(),
    ])
    .await;
    let engine = stream_engine().await;

    let client = ControlClient::connect(server).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), client.run(&engine))
        .await
        .unwrap();

    assert_eq!(
        engine.calls().await,
        vec![
            EngineCall::SetVolume(35),
            EngineCall::Stop,
            EngineCall::Play,
            EngineCall::Play,
        ]
    );
    assert!(engine.is_playing().await);
}

#[tokio::test]
async fn test_informational_notifications_leave_engine_alone() {
    let engine = stream_engine().await;

    apply(
        &engine,
        &Notification::NowPlaying {
            media: Some(MediaRef::new("file:///a.mp3")),
        },
    )
    .await
    .unwrap();
    apply(
        &engine,
        &Notification::PlaybackState {
            state: crate::types::PlaybackState::Playing,
        },
    )
    .await
    .unwrap();

    assert!(engine.calls().await.is_empty());
}

#[tokio::test]
async fn test_discover_server_times_out() {
    let config = DiscoveryConfig {
        bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        multicast_group: None,
        ..DiscoveryConfig::default()
    };

    let found = discover_server(&config, Duration::from_millis(100)).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_connect_timeout_succeeds_on_live_server() {
    let server = serve_lines(vec![Notification::Restart.encode().unwrap()]).await;

    let mut client = ControlClient::connect_timeout(server, Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(client.server_addr(), server);
    assert_eq!(client.next_notification().await, Some(Notification::Restart));
}
