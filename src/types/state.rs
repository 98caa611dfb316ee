use serde::{Deserialize, Serialize};
use std::fmt;

use super::track::QueueEntry;

/// Playback state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing loaded
    #[default]
    Idle,
    /// Media is being handed to the engine
    Loading,
    /// Audio is playing
    Playing,
    /// Playback is paused
    Paused,
    /// Media is loaded but not playing
    Stopped,
    /// The current track reached its end
    Ended,
    /// The engine reported an error for the current track
    Error,
}

impl PlaybackState {
    /// Whether audio is currently audible
    #[must_use]
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Whether the session is silent and has nothing loaded or stopped
    #[must_use]
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a playback session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Current playback state
    pub state: PlaybackState,

    /// Entry currently loaded, if any
    pub now_playing: Option<QueueEntry>,

    /// Number of entries waiting in the queue
    pub queue_length: usize,

    /// Number of entries in history
    pub history_length: usize,

    /// Volume in percent (0 - 100)
    pub volume: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_default() {
        let state = PlaybackState::default();
        assert_eq!(state, PlaybackState::Idle);
        assert!(!state.is_playing());
        assert!(state.is_stopped());
    }

    #[test]
    fn test_playback_state_display() {
        assert_eq!(PlaybackState::Playing.to_string(), "playing");
        assert_eq!(PlaybackState::Error.to_string(), "error");
    }

    #[test]
    fn test_playback_state_serde() {
        let json = serde_json::to_string(&PlaybackState::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
    }

    #[test]
    fn test_snapshot_default() {
        let snapshot = SessionSnapshot::default();
        assert!(snapshot.now_playing.is_none());
        assert_eq!(snapshot.queue_length, 0);
    }
}
