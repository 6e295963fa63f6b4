//! In-memory event sink shared between the hub and the operator interface.

use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::trace;

use crate::buffer::RingBuffer;
use crate::types::{EventSink, LogEntry, LogEvent, LogKind};

/// Number of entries kept before the oldest are discarded.
pub const DEFAULT_CAPACITY: usize = 3000;

/// Capacity of the change notification channel. Slow subscribers lag
/// rather than block writers.
const NOTIFY_CAPACITY: usize = 256;

/// Bounded, newest-first event log with change notification.
pub struct LogStore {
    entries: RwLock<RingBuffer<LogEntry>>,
    notify: broadcast::Sender<LogEntry>,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LogStore {
    /// Creates a store holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            entries: RwLock::new(RingBuffer::new(capacity)),
            notify,
        }
    }

    /// Records an event and returns the stored entry.
    pub fn push(&self, event: LogEvent) -> LogEntry {
        let entry = LogEntry::new(event);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        trace!(kind = %entry.event.kind, title = %entry.event.title, "log entry added");
        // No receivers is fine.
        let _ = self.notify.send(entry.clone());
        entry
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Snapshot of all entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Entries of the given kind (any kind when `None`) whose title, body or
    /// endpoint name contains `search`, newest first.
    pub fn filtered(&self, kind: Option<LogKind>, search: &str) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| kind.is_none_or(|k| e.event.kind == k))
            .filter(|e| e.matches(search))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }

    /// Subscribes to entries added from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.notify.subscribe()
    }
}

impl EventSink for LogStore {
    fn add(&self, event: LogEvent) {
        self.push(event);
    }
}
