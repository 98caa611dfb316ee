//! Playback session: queue, history and the now-playing entry

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use super::queue::{History, PlaybackQueue};
use super::volume::Volume;
use crate::engine::{EngineEvent, EngineEventReceiver, PlaybackEngine};
use crate::error::PartyBoxError;
use crate::output::OutputDescriptor;
use crate::state::{EventBus, SessionEvent, SnapshotContainer};
use crate::types::{EntryId, MediaRef, PlaybackState, QueueEntry, QueueMode, SessionSnapshot};

/// What the session should do with media it has just loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Play,
    Pause,
    Stop,
}

impl Intent {
    fn preserve(state: PlaybackState) -> Self {
        match state {
            PlaybackState::Playing => Self::Play,
            PlaybackState::Paused => Self::Pause,
            _ => Self::Stop,
        }
    }
}

/// State guarded by the session lock
struct SessionInner {
    state: PlaybackState,
    now_playing: Option<QueueEntry>,
    queue: PlaybackQueue,
    history: History,
    output: OutputDescriptor,
    volume: Volume,
}

/// The single playback session of a host
///
/// Every operation that touches the queue, history, now-playing entry or the
/// engine's loaded media runs under one session-wide lock, including engine
/// callbacks and output reconfiguration.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use partybox::control::PlaybackSession;
/// use partybox::engine::engine_channel;
/// use partybox::testing::MockEngine;
/// use partybox::types::{MediaRef, QueueMode};
///
/// # async fn example() -> Result<(), partybox::PartyBoxError> {
/// let (events_tx, events_rx) = engine_channel();
/// let engine = Arc::new(MockEngine::new(events_tx));
/// let session = Arc::new(PlaybackSession::new(engine, QueueMode::Ordered, Default::default()));
/// let _pump = session.spawn_event_loop(events_rx);
///
/// session.enqueue(MediaRef::new("http://example.com/1.mp3")).await;
/// session.play().await?;
/// # Ok(())
/// # }
/// ```
pub struct PlaybackSession {
    engine: Arc<dyn PlaybackEngine>,
    inner: Mutex<SessionInner>,
    events: EventBus,
    snapshot: SnapshotContainer,
}

impl PlaybackSession {
    /// Create an idle session
    #[must_use]
    pub fn new(
        engine: Arc<dyn PlaybackEngine>,
        mode: QueueMode,
        output: OutputDescriptor,
    ) -> Self {
        Self {
            engine,
            inner: Mutex::new(SessionInner {
                state: PlaybackState::Idle,
                now_playing: None,
                queue: PlaybackQueue::with_mode(mode),
                history: History::new(),
                output,
                volume: Volume::DEFAULT,
            }),
            events: EventBus::new(),
            snapshot: SnapshotContainer::new(),
        }
    }

    /// Deliver engine callbacks into the session until the engine hangs up
    pub fn spawn_event_loop(self: &Arc<Self>, mut events: EngineEventReceiver) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                session.handle_engine_event(event).await;
            }
            tracing::debug!("Engine event channel closed");
        })
    }

    // === Observation ===

    /// Subscribe to session events
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The event bus, for filtered subscriptions
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to snapshot changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.get()
    }

    /// Current playback state
    pub async fn state(&self) -> PlaybackState {
        self.inner.lock().await.state
    }

    /// Entry currently loaded
    pub async fn now_playing(&self) -> Option<QueueEntry> {
        self.inner.lock().await.now_playing.clone()
    }

    /// Entry that plays after the current one
    pub async fn up_next(&self) -> Option<QueueEntry> {
        self.inner.lock().await.queue.up_next().cloned()
    }

    /// Queued entries in play order
    pub async fn queue(&self) -> Vec<QueueEntry> {
        self.inner.lock().await.queue.iter().cloned().collect()
    }

    /// Played entries, oldest first
    pub async fn history(&self) -> Vec<QueueEntry> {
        self.inner.lock().await.history.iter().cloned().collect()
    }

    /// Sum of the known durations of queued entries, in seconds
    pub async fn queued_duration(&self) -> f64 {
        self.inner.lock().await.queue.total_duration()
    }

    /// Output descriptor used for the next load
    pub async fn output(&self) -> OutputDescriptor {
        self.inner.lock().await.output.clone()
    }

    /// Current volume
    pub async fn volume(&self) -> Volume {
        self.inner.lock().await.volume
    }

    /// Current position in percent, `None` when idle
    pub async fn position(&self) -> Option<f32> {
        self.engine.position().await
    }

    // === Queue ===

    /// Add media to the queue
    pub async fn enqueue(&self, media: MediaRef) -> EntryId {
        let mut inner = self.inner.lock().await;
        let id = inner.queue.add(media);
        self.queue_changed(&inner);
        id
    }

    /// Add media to play right after the current entry
    pub async fn enqueue_next(&self, media: MediaRef) -> EntryId {
        let mut inner = self.inner.lock().await;
        let id = inner.queue.add_next(media);
        self.queue_changed(&inner);
        id
    }

    /// Replace the queue with a playlist
    pub async fn load_playlist(&self, playlist: Vec<MediaRef>) {
        let mut inner = self.inner.lock().await;
        inner.queue.load_playlist(playlist);
        self.queue_changed(&inner);
    }

    /// Remove a queued entry
    pub async fn remove(&self, id: EntryId) -> Option<QueueEntry> {
        let mut inner = self.inner.lock().await;
        let removed = inner.queue.remove(id);
        if removed.is_some() {
            self.queue_changed(&inner);
        }
        removed
    }

    /// Empty the queue
    pub async fn clear_queue(&self) {
        let mut inner = self.inner.lock().await;
        inner.queue.clear();
        self.queue_changed(&inner);
    }

    /// Reorder the queue randomly
    pub async fn shuffle(&self) {
        let mut inner = self.inner.lock().await;
        inner.queue.shuffle();
        self.queue_changed(&inner);
    }

    /// Change where appended entries are placed
    pub async fn set_queue_mode(&self, mode: QueueMode) {
        self.inner.lock().await.queue.set_mode(mode);
    }

    // === Transport ===

    /// Play, resume, or start the next queued entry
    ///
    /// # Errors
    ///
    /// Returns error if the engine refuses to resume.
    pub async fn play(&self) -> Result<(), PartyBoxError> {
        let mut inner = self.inner.lock().await;

        match inner.state {
            PlaybackState::Playing => {}
            PlaybackState::Ended | PlaybackState::Error => {
                self.advance(&mut inner, Intent::Play).await;
            }
            _ if inner.now_playing.is_none() => {
                self.advance(&mut inner, Intent::Play).await;
            }
            _ => {
                self.engine.play().await?;
                self.set_state(&mut inner, PlaybackState::Playing);
            }
        }

        self.publish(&inner);
        Ok(())
    }

    /// Pause playback; only takes effect while playing
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to pause.
    pub async fn pause(&self) -> Result<(), PartyBoxError> {
        let mut inner = self.inner.lock().await;

        if inner.state == PlaybackState::Playing {
            self.engine.pause().await?;
            self.set_state(&mut inner, PlaybackState::Paused);
            self.publish(&inner);
        }

        Ok(())
    }

    /// Toggle play/pause
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails.
    pub async fn toggle(&self) -> Result<(), PartyBoxError> {
        if self.state().await == PlaybackState::Playing {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Stop playback, keeping the current entry loaded
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to stop.
    pub async fn stop(&self) -> Result<(), PartyBoxError> {
        let mut inner = self.inner.lock().await;

        if !inner.state.is_stopped() {
            self.engine.stop().await?;
            self.set_state(&mut inner, PlaybackState::Stopped);
            self.publish(&inner);
        }

        Ok(())
    }

    /// Skip to the next queued entry
    ///
    /// The current entry moves to history. Playing stays playing and paused
    /// stays paused; with an empty queue the session goes idle. Returns the
    /// new now-playing entry.
    pub async fn next(&self) -> Option<QueueEntry> {
        let mut inner = self.inner.lock().await;
        let intent = Intent::preserve(inner.state);
        let entry = self.advance(&mut inner, intent).await;
        self.publish(&inner);
        entry
    }

    /// Go back to the most recently played entry
    ///
    /// The current entry returns to the head of the queue. Without history
    /// this does nothing. Returns the new now-playing entry.
    pub async fn previous(&self) -> Option<QueueEntry> {
        let mut inner = self.inner.lock().await;

        let Some(entry) = inner.history.pop() else {
            tracing::warn!("No tracks in history to load");
            return inner.now_playing.clone();
        };

        let intent = Intent::preserve(inner.state);
        if let Some(current) = inner.now_playing.take() {
            inner.queue.push_front(current);
        }

        let result = if self.start(&mut inner, entry, intent).await {
            inner.now_playing.clone()
        } else {
            self.advance(&mut inner, intent).await
        };

        self.queue_changed(&inner);
        result
    }

    /// Seek within the current entry
    ///
    /// # Errors
    ///
    /// Returns error if `percent` is outside 0 - 100, nothing is loaded, or
    /// the engine fails.
    pub async fn seek(&self, percent: f32) -> Result<(), PartyBoxError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(PartyBoxError::SeekOutOfRange { percent });
        }

        let inner = self.inner.lock().await;
        if inner.now_playing.is_none() {
            return Err(PartyBoxError::InvalidState {
                message: "nothing loaded to seek in".to_string(),
                current_state: inner.state.to_string(),
            });
        }

        self.engine.set_position(percent).await
    }

    /// Set the output volume
    ///
    /// # Errors
    ///
    /// Returns error if the engine rejects the volume.
    pub async fn set_volume(&self, volume: impl Into<Volume>) -> Result<(), PartyBoxError> {
        let volume = volume.into();
        let mut inner = self.inner.lock().await;
        self.apply_volume(&mut inner, volume).await?;
        self.publish(&inner);
        Ok(())
    }

    /// Fade the volume out, pause, and restore the volume
    ///
    /// Only has an effect while playing. The session stays locked for the
    /// whole fade.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails mid-fade.
    pub async fn fade_out(&self, step: Duration) -> Result<(), PartyBoxError> {
        let mut inner = self.inner.lock().await;
        if inner.state != PlaybackState::Playing {
            return Ok(());
        }

        let original = inner.volume;
        let mut level = original;
        while !level.is_silent() {
            level = level.step_down();
            self.apply_volume(&mut inner, level).await?;
            tokio::time::sleep(step).await;
        }

        self.engine.pause().await?;
        self.set_state(&mut inner, PlaybackState::Paused);
        self.apply_volume(&mut inner, original).await?;
        self.publish(&inner);
        Ok(())
    }

    // === Output ===

    /// Switch the engine to a new output descriptor without losing position
    ///
    /// Captures position and intent, pauses, reloads the current media with
    /// the new descriptor, restores the position and resumes if it was
    /// playing. With nothing loaded the descriptor is only stored for the
    /// next load.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to pause, reload or resume. A failed
    /// reload or resume skips to the next entry; a failed reposition only logs.
    pub async fn apply_output(&self, descriptor: OutputDescriptor) -> Result<(), PartyBoxError> {
        let mut inner = self.inner.lock().await;
        inner.output = descriptor.clone();

        let Some(entry) = inner.now_playing.clone() else {
            self.events.emit(SessionEvent::OutputReconfigured { descriptor });
            return Ok(());
        };

        let was_playing = inner.state == PlaybackState::Playing;
        let position = self.engine.position().await;

        if was_playing {
            self.engine.pause().await?;
        }

        if let Err(e) = self.engine.load(&entry.media, &descriptor).await {
            tracing::error!("Reload of {} failed: {}", entry.media.display_name(), e);
            self.fail_current(&mut inner, None);
            let intent = if was_playing { Intent::Play } else { Intent::Stop };
            self.advance(&mut inner, intent).await;
            self.publish(&inner);
            return Err(e);
        }

        if let Some(percent) = position {
            if let Err(e) = self.engine.set_position(percent).await {
                tracing::warn!("Could not restore position {}%: {}", percent, e);
            }
        }
        if was_playing {
            if let Err(e) = self.engine.play().await {
                tracing::error!("Resume of {} failed: {}", entry.media.display_name(), e);
                self.fail_current(&mut inner, None);
                self.advance(&mut inner, Intent::Play).await;
                self.publish(&inner);
                return Err(e);
            }
        }

        tracing::debug!(
            "Output applied at {:?}% ({})",
            position,
            if was_playing { "playing" } else { "not playing" }
        );
        self.events.emit(SessionEvent::OutputReconfigured { descriptor });
        Ok(())
    }

    // === Engine callbacks ===

    /// Process one engine callback inside the session lock
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        let mut inner = self.inner.lock().await;

        match event {
            EngineEvent::Ended => {
                if inner.now_playing.is_none() {
                    tracing::debug!("Ignoring end of track with nothing loaded");
                    return;
                }
                tracing::info!("Track ended");
                self.set_state(&mut inner, PlaybackState::Ended);
                self.advance(&mut inner, Intent::Play).await;
            }
            EngineEvent::Errored { code } => {
                if inner.now_playing.is_none() {
                    tracing::debug!("Ignoring engine error {} with nothing loaded", code);
                    return;
                }
                self.fail_current(&mut inner, Some(code));
                self.advance(&mut inner, Intent::Play).await;
            }
            EngineEvent::MediaChanged(media) => {
                tracing::info!("Track changed: {}", media.uri);
                self.events.emit(SessionEvent::NowPlayingChanged { media: Some(media) });
                self.events.emit(SessionEvent::OutputReconfigured {
                    descriptor: inner.output.clone(),
                });
            }
        }

        self.publish(&inner);
    }

    // === Internals (caller holds the lock) ===

    /// Move now-playing to history and start queued entries until one loads
    async fn advance(
        &self,
        inner: &mut SessionInner,
        intent: Intent,
    ) -> Option<QueueEntry> {
        if let Some(current) = inner.now_playing.take() {
            inner.history.push(current);
        }

        while let Some(entry) = inner.queue.pop_front() {
            self.queue_changed(inner);
            if self.start(inner, entry, intent).await {
                return inner.now_playing.clone();
            }
            if let Some(failed) = inner.now_playing.take() {
                inner.history.push(failed);
            }
        }

        if !inner.state.is_stopped() {
            if let Err(e) = self.engine.stop().await {
                tracing::warn!("Engine failed to stop: {}", e);
            }
        }
        tracing::info!("Queue exhausted");
        self.set_state(inner, PlaybackState::Idle);
        self.events.emit(SessionEvent::NowPlayingChanged { media: None });
        None
    }

    /// Load `entry` as now-playing and apply `intent`; false if the engine failed
    async fn start(
        &self,
        inner: &mut SessionInner,
        entry: QueueEntry,
        intent: Intent,
    ) -> bool {
        self.set_state(inner, PlaybackState::Loading);
        tracing::info!("Loading {}", entry.media.display_name());

        let media = entry.media.clone();
        inner.now_playing = Some(entry);

        if let Err(e) = self.engine.load(&media, &inner.output).await {
            tracing::error!("Failed to load {}: {}", media.display_name(), e);
            self.fail_current(inner, None);
            return false;
        }

        let next_state = match intent {
            Intent::Play => {
                if let Err(e) = self.engine.play().await {
                    tracing::error!("Failed to play {}: {}", media.display_name(), e);
                    self.fail_current(inner, None);
                    return false;
                }
                PlaybackState::Playing
            }
            Intent::Pause => PlaybackState::Paused,
            Intent::Stop => PlaybackState::Stopped,
        };

        self.set_state(inner, next_state);
        true
    }

    fn fail_current(&self, inner: &mut SessionInner, code: Option<i32>) {
        if let Some(entry) = inner.now_playing.clone() {
            tracing::error!(
                "Playback of {} failed (code {:?}), skipping",
                entry.media.display_name(),
                code
            );
            self.events.emit(SessionEvent::TrackFailed { entry, code });
        }
        self.set_state(inner, PlaybackState::Error);
    }

    async fn apply_volume(
        &self,
        inner: &mut SessionInner,
        volume: Volume,
    ) -> Result<(), PartyBoxError> {
        self.engine.set_volume(volume.as_percent()).await?;
        if inner.volume != volume {
            inner.volume = volume;
            self.events.emit(SessionEvent::VolumeChanged {
                percent: volume.as_percent(),
            });
        }
        Ok(())
    }

    fn set_state(&self, inner: &mut SessionInner, new: PlaybackState) {
        let old = inner.state;
        if old != new {
            inner.state = new;
            self.events.emit(SessionEvent::StateChanged { old, new });
        }
    }

    fn queue_changed(&self, inner: &SessionInner) {
        self.events.emit(SessionEvent::QueueUpdated {
            length: inner.queue.len(),
        });
        self.publish(inner);
    }

    fn publish(&self, inner: &SessionInner) {
        self.snapshot.publish(SessionSnapshot {
            state: inner.state,
            now_playing: inner.now_playing.clone(),
            queue_length: inner.queue.len(),
            history_length: inner.history.len(),
            volume: inner.volume.as_percent(),
        });
    }
}
