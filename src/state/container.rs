//! Observable session state

use tokio::sync::watch;

use crate::types::SessionSnapshot;

/// Latest session snapshot with change notifications
pub struct SnapshotContainer {
    tx: watch::Sender<SessionSnapshot>,
}

impl SnapshotContainer {
    /// Create a container holding the default snapshot
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    /// Get current snapshot
    #[must_use]
    pub fn get(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Subscribe to snapshot changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Replace the snapshot, notifying subscribers only if it changed
    pub fn publish(&self, snapshot: SessionSnapshot) {
        self.tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl Default for SnapshotContainer {
    fn default() -> Self {
        Self::new()
    }
}
