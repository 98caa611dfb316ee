//! Playback control module

pub mod queue;
pub mod session;
pub mod volume;

#[cfg(test)]
mod tests;

pub use queue::{History, PlaybackQueue};
pub use session::PlaybackSession;
pub use volume::Volume;
