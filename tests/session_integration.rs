//! Session scenarios driven through the public API only

use std::sync::{Arc, Once};
use std::time::Duration;

use partybox::control::PlaybackSession;
use partybox::engine::engine_channel;
use partybox::output::{OutputRouter, OutputSettings};
use partybox::testing::MockEngine;
use partybox::types::QueueMode;
use partybox::{MediaRef, PlaybackState, SessionEvent};

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("partybox=debug")
            .with_test_writer()
            .try_init();
    });
}

fn session() -> (Arc<PlaybackSession>, Arc<MockEngine>) {
    let (tx, rx) = engine_channel();
    let engine = Arc::new(MockEngine::new(tx));
    let session = Arc::new(PlaybackSession::new(
        engine.clone(),
        QueueMode::Ordered,
        Default::default(),
    ));
    session.spawn_event_loop(rx);
    (session, engine)
}

fn track(n: u32) -> MediaRef {
    MediaRef::new(format!("file:///party/{n}.mp3")).with_title(format!("Track {n}"))
}

#[tokio::test]
async fn test_next_previous_round_trip_keeps_queue_length() {
    init();
    let (session, _engine) = session();
    for n in 0..5 {
        session.enqueue(track(n)).await;
    }
    session.play().await.unwrap();
    let before_current = session.now_playing().await.unwrap();
    let before_len = session.queue().await.len();

    session.next().await;
    session.previous().await;

    assert_eq!(session.now_playing().await.unwrap().id, before_current.id);
    assert_eq!(session.queue().await.len(), before_len);
    assert_eq!(session.state().await, PlaybackState::Playing);
}

#[tokio::test]
async fn test_play_through_whole_playlist() {
    init();
    let (session, engine) = session();
    session.load_playlist((0..4).map(track).collect()).await;
    let mut snapshots = session.subscribe();

    session.play().await.unwrap();
    for _ in 0..4 {
        engine.finish_track();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let idle = tokio::time::timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| s.state == PlaybackState::Idle && s.history_length == 4),
    )
    .await
    .is_ok();
    assert!(idle);
    assert!(session.now_playing().await.is_none());
}

#[tokio::test]
async fn test_router_reconfiguration_is_announced() {
    init();
    let (session, engine) = session();
    let router = OutputRouter::new(OutputSettings::default(), session.clone());
    let mut events = session.events();
    session.enqueue(track(1)).await;
    session.play().await.unwrap();
    engine.advance_to(42.0).await;

    let descriptor = router
        .reconfigure(["10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()])
        .await
        .unwrap();

    assert_eq!(descriptor.client_count(), 2);
    assert_eq!(session.position().await, Some(42.0));

    let mut announced = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::OutputReconfigured { descriptor: d } = event {
            announced |= d == descriptor;
        }
    }
    assert!(announced);
}
