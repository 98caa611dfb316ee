//! Core types module

mod config;
mod state;
mod track;


pub use config::{
    DEFAULT_GROUP, DEFAULT_PORT, DiscoveryConfig, QueueMode, ServerConfig, ServerConfigBuilder,
};
pub use state::{PlaybackState, SessionSnapshot};
pub use track::{EntryId, MediaRef, QueueEntry};
