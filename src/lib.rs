//! # partybox
//!
//! Shared party playback for a room full of devices.
//!
//! A host plays one queue and streams it to every client on the local
//! network. Clients find the host through periodic announcements, keep a
//! persistent control connection open, and follow the host's notifications.
//! Whenever a client joins or leaves, the stream is re-targeted without
//! losing the playback position.
//!
//! ## Features
//!
//! - Presence announcement and discovery over UDP broadcast or multicast
//! - Control channel with per-client ordered notification queues
//! - Playback queue, history and transport state machine
//! - Output reconfiguration that preserves position and play/pause intent
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use partybox::engine::engine_channel;
//! use partybox::testing::MockEngine;
//! use partybox::{MediaRef, PartyHost, ServerConfig};
//!
//! # async fn example() -> Result<(), partybox::PartyBoxError> {
//! let (events_tx, events_rx) = engine_channel();
//! let engine = Arc::new(MockEngine::new(events_tx));
//!
//! let mut host = PartyHost::builder(ServerConfig::default())
//!     .engine(engine, events_rx)
//!     .start()
//!     .await?;
//!
//! host.session().enqueue(MediaRef::new("file:///music/opener.mp3")).await;
//! host.session().play().await?;
//!
//! // ... later
//! host.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Host**: [`PartyHost`] wires everything below together
//! - **Session**: [`PlaybackSession`] owns queue, history and now-playing
//! - **Plumbing**: control server, output router and discovery
//! - **Boundary**: [`engine::PlaybackEngine`] is the external media engine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Session state and events
pub mod state;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod client;
pub mod control;
pub mod discovery;
pub mod engine;
pub mod host;
pub mod output;
pub mod server;

// Re-exports
pub use client::{ControlClient, discover_server};
pub use control::{PlaybackSession, Volume};
pub use discovery::{AnnouncePacket, Announcer, DiscoveredServer, Listener, ServerIdentity};
pub use error::{PartyBoxError, Result};
pub use host::{HostBuilder, PartyHost};
pub use output::{OutputDescriptor, OutputRouter};
pub use server::{ClientRegistry, ControlServer, Notification, ServerEvent};
pub use state::SessionEvent;
pub use types::{MediaRef, PlaybackState, QueueEntry, ServerConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        ControlClient, MediaRef, Notification, PartyBoxError, PartyHost, PlaybackSession,
        PlaybackState, ServerConfig, Volume, discover_server,
    };
}
