//! In-memory playback engine
//!
//! Records every call, tracks loaded media, position and volume, and reports
//! callbacks over the engine channel the same way a real engine would.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::engine::{EngineEvent, EngineEventSender, PlaybackEngine};
use crate::error::PartyBoxError;
use crate::output::OutputDescriptor;
use crate::types::MediaRef;

/// A call received by the mock engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// Media loaded with the given number of stream targets
    Load {
        /// Loaded URI
        uri: String,
        /// Targets in the descriptor
        targets: usize,
    },
    /// Playback started or resumed
    Play,
    /// Playback paused
    Pause,
    /// Playback stopped
    Stop,
    /// Seek in percent
    SetPosition(f32),
    /// Volume in percent
    SetVolume(u8),
}

#[derive(Debug, Default)]
struct MockState {
    loaded: Option<MediaRef>,
    output: Option<OutputDescriptor>,
    playing: bool,
    position: Option<f32>,
    volume: u8,
    calls: Vec<EngineCall>,
    refuse_load: HashSet<String>,
    fail_playback: HashSet<String>,
    refuse_play: HashSet<String>,
    refuse_seek: bool,
}

/// Playback engine that plays nothing
pub struct MockEngine {
    events: EngineEventSender,
    state: Mutex<MockState>,
}

impl MockEngine {
    /// Create a mock reporting on `events`
    #[must_use]
    pub fn new(events: EngineEventSender) -> Self {
        Self {
            events,
            state: Mutex::new(MockState {
                volume: 100,
                ..MockState::default()
            }),
        }
    }

    /// Make `load` return an error for this URI
    pub async fn refuse_load(&self, uri: impl Into<String>) {
        self.state.lock().await.refuse_load.insert(uri.into());
    }

    /// Report `Errored` right after `play` for this URI
    pub async fn fail_playback(&self, uri: impl Into<String>) {
        self.state.lock().await.fail_playback.insert(uri.into());
    }

    /// Make `play` return an error for this URI
    pub async fn refuse_play(&self, uri: impl Into<String>) {
        self.state.lock().await.refuse_play.insert(uri.into());
    }

    /// Make every `set_position` return an error
    pub async fn refuse_seek(&self) {
        self.state.lock().await.refuse_seek = true;
    }

    /// Pretend playback progressed to `percent`
    pub async fn advance_to(&self, percent: f32) {
        self.state.lock().await.position = Some(percent);
    }

    /// Report the end of the current track
    pub fn finish_track(&self) {
        let _ = self.events.send(EngineEvent::Ended);
    }

    /// Report an engine failure
    pub fn report_error(&self, code: i32) {
        let _ = self.events.send(EngineEvent::Errored { code });
    }

    /// Calls received so far
    pub async fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().await.calls.clone()
    }

    /// Forget the recorded calls
    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Media currently loaded
    pub async fn loaded(&self) -> Option<MediaRef> {
        self.state.lock().await.loaded.clone()
    }

    /// Descriptor of the last load
    pub async fn output(&self) -> Option<OutputDescriptor> {
        self.state.lock().await.output.clone()
    }

    /// Whether the engine is playing
    pub async fn is_playing(&self) -> bool {
        self.state.lock().await.playing
    }
}

#[async_trait]
impl PlaybackEngine for MockEngine {
    async fn load(&self, media: &MediaRef, output: &OutputDescriptor) -> Result<(), PartyBoxError> {
        let mut state = self.state.lock().await;
        state.calls.push(EngineCall::Load {
            uri: media.uri.clone(),
            targets: output.targets().len(),
        });

        if state.refuse_load.contains(&media.uri) {
            return Err(PartyBoxError::Engine {
                message: format!("cannot open {}", media.uri),
            });
        }

        state.loaded = Some(media.clone());
        state.output = Some(output.clone());
        state.playing = false;
        state.position = Some(0.0);

        let _ = self.events.send(EngineEvent::MediaChanged(media.clone()));
        Ok(())
    }

    async fn play(&self) -> Result<(), PartyBoxError> {
        let mut state = self.state.lock().await;
        state.calls.push(EngineCall::Play);

        let Some(media) = state.loaded.clone() else {
            return Err(PartyBoxError::Engine {
                message: "nothing loaded".to_string(),
            });
        };

        if state.refuse_play.contains(&media.uri) {
            return Err(PartyBoxError::Engine {
                message: format!("cannot start {}", media.uri),
            });
        }

        state.playing = true;
        if state.fail_playback.contains(&media.uri) {
            let _ = self.events.send(EngineEvent::Errored { code: 1 });
        }
        Ok(())
    }

    async fn pause(&self) -> Result<(), PartyBoxError> {
        let mut state = self.state.lock().await;
        state.calls.push(EngineCall::Pause);
        state.playing = false;
        Ok(())
    }

    async fn stop(&self) -> Result<(), PartyBoxError> {
        let mut state = self.state.lock().await;
        state.calls.push(EngineCall::Stop);
        state.playing = false;
        if state.loaded.is_some() {
            state.position = Some(0.0);
        }
        Ok(())
    }

    async fn set_position(&self, percent: f32) -> Result<(), PartyBoxError> {
        let mut state = self.state.lock().await;
        state.calls.push(EngineCall::SetPosition(percent));
        if state.refuse_seek {
            return Err(PartyBoxError::Engine {
                message: "seek not supported".to_string(),
            });
        }
        if state.loaded.is_none() {
            return Err(PartyBoxError::Engine {
                message: "nothing loaded".to_string(),
            });
        }
        state.position = Some(percent);
        Ok(())
    }

    async fn position(&self) -> Option<f32> {
        self.state.lock().await.position
    }

    async fn set_volume(&self, percent: u8) -> Result<(), PartyBoxError> {
        let mut state = self.state.lock().await;
        state.calls.push(EngineCall::SetVolume(percent));
        state.volume = percent.min(100);
        Ok(())
    }

    async fn volume(&self) -> u8 {
        self.state.lock().await.volume
    }
}
