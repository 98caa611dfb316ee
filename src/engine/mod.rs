//! Boundary to the external media playback engine
//!
//! The engine decodes, transcodes and streams audio; this crate only drives
//! it. Calls into the engine go through [`PlaybackEngine`]. Callbacks from the
//! engine are delivered as [`EngineEvent`] messages over an unbounded channel
//! so that they can be processed inside the session's serialized region
//! instead of on the engine's own callback thread.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PartyBoxError;
use crate::output::OutputDescriptor;
use crate::types::MediaRef;

/// Playback engine driven by the session
///
/// `load` and `play` may complete before the engine has actually started, and
/// an engine event for the previous media may still be in flight when they
/// return.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Load media and route its output to the given targets
    async fn load(&self, media: &MediaRef, output: &OutputDescriptor) -> Result<(), PartyBoxError>;

    /// Start or resume playback of the loaded media
    async fn play(&self) -> Result<(), PartyBoxError>;

    /// Pause playback
    async fn pause(&self) -> Result<(), PartyBoxError>;

    /// Stop playback
    async fn stop(&self) -> Result<(), PartyBoxError>;

    /// Seek to a position in percent (0.0 - 100.0)
    async fn set_position(&self, percent: f32) -> Result<(), PartyBoxError>;

    /// Current position in percent, `None` when idle
    async fn position(&self) -> Option<f32>;

    /// Set output volume in percent (0 - 100)
    async fn set_volume(&self, percent: u8) -> Result<(), PartyBoxError>;

    /// Current output volume in percent
    async fn volume(&self) -> u8;
}

/// Callbacks from the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The current track played to its end
    Ended,
    /// The engine failed on the current track
    Errored {
        /// Engine specific error code
        code: i32,
    },
    /// The engine switched to new media
    MediaChanged(MediaRef),
}

/// Sending half handed to the engine
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiving half consumed by the session
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the channel the engine reports its callbacks on
#[must_use]
pub fn engine_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}
