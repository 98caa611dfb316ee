//! Control-channel notifications
//!
//! The server writes one JSON object per line. Every object carries a `type`
//! tag, for example:
//!
//! ```text
//! {"type":"now_playing","media":{"uri":"file:///song.mp3","title":"Song"}}
//! {"type":"volume","percent":40}
//! {"type":"restart"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::PartyBoxError;
use crate::output::OutputDescriptor;
use crate::types::{MediaRef, PlaybackState};

/// Server-to-client notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The now-playing media changed; `None` when the session went idle
    NowPlaying {
        /// New media
        media: Option<MediaRef>,
    },
    /// Playback state changed
    PlaybackState {
        /// New state
        state: PlaybackState,
    },
    /// Output volume changed
    Volume {
        /// Volume in percent
        percent: u8,
    },
    /// Clients should restart their stream
    Restart,
    /// The stream targets changed; clients should (re)start receiving
    OutputReconfigured {
        /// The descriptor now in effect
        descriptor: OutputDescriptor,
    },
}

impl Notification {
    /// Encode as a single line without the terminator
    ///
    /// # Errors
    ///
    /// Returns `Encode` if serialization fails.
    pub fn encode(&self) -> Result<String, PartyBoxError> {
        serde_json::to_string(self).map_err(|e| PartyBoxError::Encode {
            message: e.to_string(),
        })
    }

    /// Decode one line
    ///
    /// # Errors
    ///
    /// Returns `Decode` if the line is not a known notification.
    pub fn decode(line: &str) -> Result<Self, PartyBoxError> {
        serde_json::from_str(line.trim()).map_err(|e| PartyBoxError::Decode {
            message: e.to_string(),
        })
    }

    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NowPlaying { .. } => "now_playing",
            Self::PlaybackState { .. } => "playback_state",
            Self::Volume { .. } => "volume",
            Self::Restart => "restart",
            Self::OutputReconfigured { .. } => "output_reconfigured",
        }
    }
}
