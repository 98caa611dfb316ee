//! Event bus for session events

use tokio::sync::broadcast;

use crate::output::OutputDescriptor;
use crate::types::{MediaRef, PlaybackState, QueueEntry};

/// Session events
#[derive(Debug, Clone)]
pub enum SessionEvent {
    // Playback events
    /// Playback state changed
    StateChanged {
        /// Old state
        old: PlaybackState,
        /// New state
        new: PlaybackState,
    },
    /// The engine switched media, or the session went idle
    NowPlayingChanged {
        /// New media, `None` when nothing is loaded
        media: Option<MediaRef>,
    },
    /// An entry failed and was skipped
    TrackFailed {
        /// The failing entry
        entry: QueueEntry,
        /// Engine error code, if the engine reported one
        code: Option<i32>,
    },

    // Volume events
    /// Volume changed
    VolumeChanged {
        /// New volume in percent
        percent: u8,
    },

    // Queue events
    /// Queue contents changed
    QueueUpdated {
        /// New queue length
        length: usize,
    },

    // Output events
    /// The stream targets were (re)applied
    OutputReconfigured {
        /// The descriptor now in effect
        descriptor: OutputDescriptor,
    },
}

/// Event bus for distributing events
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emit an event
    pub fn emit(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    /// Get subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<SessionEvent>,
    filter: Box<dyn Fn(&SessionEvent) -> bool + Send>,
    missed: u64,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&SessionEvent) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
            missed: 0,
        }
    }

    /// Events dropped because this receiver fell behind
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.missed += skipped;
                    tracing::warn!("Event receiver lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Filter for events subscribed clients care about
    #[must_use]
    pub fn client_facing(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(
                e,
                SessionEvent::StateChanged { .. }
                    | SessionEvent::NowPlayingChanged { .. }
                    | SessionEvent::VolumeChanged { .. }
                    | SessionEvent::OutputReconfigured { .. }
            )
        })
    }
}
