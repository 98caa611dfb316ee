//! Session state and events

mod container;
mod events;

pub use container::SnapshotContainer;
pub use events::{EventBus, EventFilter, SessionEvent};
