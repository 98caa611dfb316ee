//! Playback queue and history

use std::collections::VecDeque;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::types::{EntryId, MediaRef, QueueEntry, QueueMode};

/// Entries waiting to be played, position 0 is "up next"
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    /// Queue entries
    entries: VecDeque<QueueEntry>,
    /// Placement policy for appended entries
    mode: QueueMode,
}

impl PlaybackQueue {
    /// Create an empty ordered queue
    #[must_use]
    pub fn new() -> Self {
        Self::with_mode(QueueMode::Ordered)
    }

    /// Create an empty queue with the given placement policy
    #[must_use]
    pub fn with_mode(mode: QueueMode) -> Self {
        Self {
            entries: VecDeque::new(),
            mode,
        }
    }

    /// Placement policy
    #[must_use]
    pub fn mode(&self) -> QueueMode {
        self.mode
    }

    /// Change the placement policy for future appends
    pub fn set_mode(&mut self, mode: QueueMode) {
        self.mode = mode;
    }

    /// Add media at the end of the queue, or at a random position when shuffled
    pub fn add(&mut self, media: MediaRef) -> EntryId {
        let entry = QueueEntry::new(media);
        let id = entry.id;

        match self.mode {
            QueueMode::Ordered => self.entries.push_back(entry),
            QueueMode::Shuffled => {
                let at = rand::thread_rng().gen_range(0..=self.entries.len());
                self.entries.insert(at, entry);
            }
        }

        id
    }

    /// Add media to be played next
    pub fn add_next(&mut self, media: MediaRef) -> EntryId {
        let entry = QueueEntry::new(media);
        let id = entry.id;
        self.entries.push_front(entry);
        id
    }

    /// Put an existing entry back at the head
    pub(crate) fn push_front(&mut self, entry: QueueEntry) {
        self.entries.push_front(entry);
    }

    /// Remove and return the entry that is up next
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// The entry that is up next
    #[must_use]
    pub fn up_next(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Remove an entry by ID
    pub fn remove(&mut self, id: EntryId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(index)
    }

    /// Clear the queue
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace the queue contents with a playlist
    pub fn load_playlist<I>(&mut self, playlist: I)
    where
        I: IntoIterator<Item = MediaRef>,
    {
        self.clear();
        for media in playlist {
            self.add(media);
        }
    }

    /// Reorder all entries randomly
    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.entries.make_contiguous().shuffle(&mut rng);
    }

    /// Check whether an entry is queued
    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Get queue length
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in play order
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Get the next `count` entries
    #[must_use]
    pub fn upcoming(&self, count: usize) -> Vec<&QueueEntry> {
        self.entries.iter().take(count).collect()
    }

    /// Sum of the known durations in seconds
    #[must_use]
    pub fn total_duration(&self) -> f64 {
        self.entries
            .iter()
            .filter_map(|e| e.media.duration_secs)
            .sum()
    }
}

/// Previously played entries, most recent last
#[derive(Debug, Default)]
pub struct History {
    entries: Vec<QueueEntry>,
}

impl History {
    /// Create an empty history
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry as played
    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// Take the most recently played entry
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop()
    }

    /// The most recently played entry
    #[must_use]
    pub fn last(&self) -> Option<&QueueEntry> {
        self.entries.last()
    }

    /// Check whether an entry is in history
    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Get history length
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate from oldest to most recent
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Forget all played entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
