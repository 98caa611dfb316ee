
use std::sync::Arc;
use std::time::Duration;

use super::session::PlaybackSession;
use crate::engine::{EngineEvent, engine_channel};
use crate::error::PartyBoxError;
use crate::output::OutputDescriptor;
use crate::state::SessionEvent;
use crate::testing::{EngineCall, MockEngine};
use crate::types::{MediaRef, PlaybackState, QueueMode, SessionSnapshot};

fn media(name: &str) -> MediaRef {
    MediaRef::new(format!("file:///{name}.mp3")).with_title(name)
}

fn setup() -> (Arc<PlaybackSession>, Arc<MockEngine>) {
    let (tx, rx) = engine_channel();
    let engine = Arc::new(MockEngine::new(tx));
    let session = Arc::new(PlaybackSession::new(
        engine.clone(),
        QueueMode::Ordered,
        OutputDescriptor::default(),
    ));
    session.spawn_event_loop(rx);
    (session, engine)
}

async fn wait_for<F>(session: &PlaybackSession, predicate: F) -> SessionSnapshot
where
    F: FnMut(&SessionSnapshot) -> bool,
{
    let mut rx = session.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session dropped");
    snapshot.clone()
}

fn playing_uri(snapshot: &SessionSnapshot) -> Option<&str> {
    snapshot.now_playing.as_ref().map(|e| e.media.uri.as_str())
}

#[tokio::test]
async fn test_new_session_is_idle() {
    let (session, _engine) = setup();

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert!(session.now_playing().await.is_none());
    assert!(session.queue().await.is_empty());
    assert!(session.history().await.is_empty());
    assert!(session.position().await.is_none());
}

#[tokio::test]
async fn test_play_starts_first_entry() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;

    session.play().await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Playing);
    assert_eq!(
        session.now_playing().await.unwrap().media.uri,
        "file:///a.mp3"
    );
    assert_eq!(session.queue().await.len(), 1);
    assert!(engine.is_playing().await);
}

#[tokio::test]
async fn test_play_with_empty_queue_stays_idle() {
    let (session, engine) = setup();

    session.play().await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert!(engine.loaded().await.is_none());
}

#[tokio::test]
async fn test_next_moves_current_to_history() {
    let (session, _engine) = setup();
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;
    session.play().await.unwrap();

    let entry = session.next().await.unwrap();

    assert_eq!(entry.media.uri, "file:///b.mp3");
    assert_eq!(session.state().await, PlaybackState::Playing);
    let history = session.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].media.uri, "file:///a.mp3");
    assert!(session.queue().await.is_empty());
}

#[tokio::test]
async fn test_next_on_last_entry_goes_idle() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.play().await.unwrap();

    assert!(session.next().await.is_none());

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert!(session.now_playing().await.is_none());
    assert_eq!(session.history().await.len(), 1);
    assert!(!engine.is_playing().await);
}

#[tokio::test]
async fn test_next_preserves_pause() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;
    session.play().await.unwrap();
    session.pause().await.unwrap();

    session.next().await;

    assert_eq!(session.state().await, PlaybackState::Paused);
    assert_eq!(engine.loaded().await.unwrap().uri, "file:///b.mp3");
    assert!(!engine.is_playing().await);
}

#[tokio::test]
async fn test_next_when_stopped_loads_without_playing() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;

    session.next().await;

    assert_eq!(session.state().await, PlaybackState::Stopped);
    assert_eq!(engine.loaded().await.unwrap().uri, "file:///a.mp3");
    assert!(!engine.is_playing().await);
}

#[tokio::test]
async fn test_previous_requeues_current() {
    let (session, _engine) = setup();
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;
    session.enqueue(media("c")).await;
    session.play().await.unwrap();
    session.next().await;

    let entry = session.previous().await.unwrap();

    assert_eq!(entry.media.uri, "file:///a.mp3");
    assert_eq!(session.state().await, PlaybackState::Playing);
    assert!(session.history().await.is_empty());
    let queue: Vec<_> = session
        .queue()
        .await
        .into_iter()
        .map(|e| e.media.uri)
        .collect();
    assert_eq!(queue, vec!["file:///b.mp3", "file:///c.mp3"]);
}

#[tokio::test]
async fn test_previous_without_history_is_noop() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.play().await.unwrap();
    engine.clear_calls().await;

    let entry = session.previous().await.unwrap();

    assert_eq!(entry.media.uri, "file:///a.mp3");
    assert_eq!(session.state().await, PlaybackState::Playing);
    assert!(engine.calls().await.is_empty());
}

#[tokio::test]
async fn test_entries_stay_disjoint() {
    let (session, _engine) = setup();
    for name in ["a", "b", "c", "d"] {
        session.enqueue(media(name)).await;
    }
    session.play().await.unwrap();
    session.next().await;
    session.next().await;
    session.previous().await;

    let current = session.now_playing().await.unwrap();
    let queue = session.queue().await;
    let history = session.history().await;

    assert!(!queue.iter().any(|e| e.id == current.id));
    assert!(!history.iter().any(|e| e.id == current.id));
    assert!(!queue.iter().any(|q| history.iter().any(|h| h.id == q.id)));
    assert_eq!(queue.len() + history.len() + 1, 4);
}

#[tokio::test]
async fn test_pause_only_while_playing() {
    let (session, engine) = setup();

    session.pause().await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert!(!engine.calls().await.contains(&EngineCall::Pause));
}

#[tokio::test]
async fn test_stop_keeps_media_loaded() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.play().await.unwrap();

    session.stop().await.unwrap();
    assert_eq!(session.state().await, PlaybackState::Stopped);
    assert!(session.now_playing().await.is_some());

    session.play().await.unwrap();
    assert_eq!(session.state().await, PlaybackState::Playing);
    assert_eq!(engine.loaded().await.unwrap().uri, "file:///a.mp3");
    assert!(session.history().await.is_empty());
}

#[tokio::test]
async fn test_toggle() {
    let (session, _engine) = setup();
    session.enqueue(media("a")).await;

    session.toggle().await.unwrap();
    assert_eq!(session.state().await, PlaybackState::Playing);

    session.toggle().await.unwrap();
    assert_eq!(session.state().await, PlaybackState::Paused);
}

#[tokio::test]
async fn test_track_end_advances() {
    let (session, engine) = setup();
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;
    session.play().await.unwrap();

    engine.finish_track();

    let snapshot = wait_for(&session, |s| playing_uri(s) == Some("file:///b.mp3")).await;
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.history_length, 1);
}

#[tokio::test]
async fn test_engine_error_skips_entry() {
    let (session, engine) = setup();
    let mut events = session.events();
    engine.fail_playback("file:///a.mp3").await;
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;
    session.enqueue(media("c")).await;

    session.play().await.unwrap();

    let snapshot = wait_for(&session, |s| playing_uri(s) == Some("file:///b.mp3")).await;
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.queue_length, 1);
    let history = session.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].media.uri, "file:///a.mp3");

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::TrackFailed { entry, code } = event {
            assert_eq!(entry.media.uri, "file:///a.mp3");
            assert_eq!(code, Some(1));
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_refused_load_skips_to_next() {
    let (session, engine) = setup();
    engine.refuse_load("file:///a.mp3").await;
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;

    session.play().await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Playing);
    assert_eq!(
        session.now_playing().await.unwrap().media.uri,
        "file:///b.mp3"
    );
    assert_eq!(session.history().await.len(), 1);
}

#[tokio::test]
async fn test_every_entry_failing_goes_idle() {
    let (session, engine) = setup();
    engine.refuse_load("file:///a.mp3").await;
    engine.refuse_load("file:///b.mp3").await;
    session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;

    session.play().await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert!(session.now_playing().await.is_none());
    assert_eq!(session.history().await.len(), 2);
}

#[tokio::test]
async fn test_stale_engine_events_ignored_when_idle() {
    let (session, _engine) = setup();
    session.enqueue(media("a")).await;

    session.handle_engine_event(EngineEvent::Ended).await;
    session
        .handle_engine_event(EngineEvent::Errored { code: 7 })
        .await;

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert_eq!(session.queue().await.len(), 1);
    assert!(session.history().await.is_empty());
}

#[tokio::test]
async fn test_media_changed_announces_track() {
    let (session, _engine) = setup();
    let mut events = session.events();

    session
        .handle_engine_event(EngineEvent::MediaChanged(media("x")))
        .await;

    let mut saw_track = false;
    let mut saw_output = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::NowPlayingChanged { media: Some(m) } => {
                assert_eq!(m.uri, "file:///x.mp3");
                saw_track = true;
            }
            SessionEvent::OutputReconfigured { .. } => saw_output = true,
            _ => {}
        }
    }
    assert!(saw_track && saw_output);
}

#[tokio::test]
async fn test_seek() {
    let (session, engine) = setup();

    assert!(matches!(
        session.seek(150.0).await,
        Err(PartyBoxError::SeekOutOfRange { .. })
    ));
    assert!(matches!(
        session.seek(10.0).await,
        Err(PartyBoxError::InvalidState { .. })
    ));

    session.enqueue(media("a")).await;
    session.play().await.unwrap();
    session.seek(42.0).await.unwrap();

    assert_eq!(session.position().await, Some(42.0));
    assert!(engine.calls().await.contains(&EngineCall::SetPosition(42.0)));
}

#[tokio::test]
async fn test_set_volume_emits_once() {
    let (session, engine) = setup();
    let mut events = session.events();

    session.set_volume(40).await.unwrap();
    session.set_volume(40).await.unwrap();
    session.set_volume(250).await.unwrap();

    assert_eq!(session.volume().await.as_percent(), 100);
    assert_eq!(session.snapshot().volume, 100);

    let changes: Vec<u8> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            SessionEvent::VolumeChanged { percent } => Some(percent),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![40, 100]);
    assert!(engine.calls().await.contains(&EngineCall::SetVolume(100)));
}

#[tokio::test]
async fn test_fade_out_pauses_and_restores_volume() {
    let (session, engine) = setup();
    session.set_volume(5).await.unwrap();
    session.enqueue(media("a")).await;
    session.play().await.unwrap();

    session.fade_out(Duration::ZERO).await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Paused);
    assert_eq!(session.volume().await.as_percent(), 5);
    let calls = engine.calls().await;
    assert!(calls.contains(&EngineCall::SetVolume(0)));
    assert!(calls.contains(&EngineCall::Pause));
}

#[tokio::test]
async fn test_fade_out_when_not_playing() {
    let (session, engine) = setup();

    session.fade_out(Duration::ZERO).await.unwrap();

    assert_eq!(session.state().await, PlaybackState::Idle);
    assert!(engine.calls().await.is_empty());
}

#[tokio::test]
async fn test_queue_editing() {
    let (session, _engine) = setup();
    let a = session.enqueue(media("a")).await;
    session.enqueue(media("b")).await;
    session.enqueue_next(media("c")).await;

    assert_eq!(session.up_next().await.unwrap().media.uri, "file:///c.mp3");
    assert!(session.remove(a).await.is_some());
    assert!(session.remove(a).await.is_none());
    assert_eq!(session.snapshot().queue_length, 2);

    session.load_playlist(vec![media("x").with_duration(60.0), media("y")]).await;
    assert_eq!(session.queue().await.len(), 2);
    assert!((session.queued_duration().await - 60.0).abs() < f64::EPSILON);

    session.clear_queue().await;
    assert!(session.queue().await.is_empty());
}

#[tokio::test]
async fn test_party_scenario() {
    let (session, engine) = setup();
    session
        .load_playlist(vec![media("a"), media("b"), media("c")])
        .await;

    session.play().await.unwrap();
    engine.finish_track();
    wait_for(&session, |s| playing_uri(s) == Some("file:///b.mp3")).await;

    session.enqueue_next(media("request")).await;
    session.next().await;
    assert_eq!(
        session.now_playing().await.unwrap().media.uri,
        "file:///request.mp3"
    );

    session.next().await;
    assert!(session.next().await.is_none());

    let snapshot = wait_for(&session, |s| s.state == PlaybackState::Idle).await;
    assert_eq!(snapshot.history_length, 4);
    assert_eq!(snapshot.queue_length, 0);
}
