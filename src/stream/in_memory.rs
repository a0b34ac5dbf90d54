//! In-memory change feed for testing and single-process use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use super::{ChangeStream, StreamError};
use crate::change::ChangeEnvelope;

/// In-memory change feed.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Fan-out: every subscriber created with `new_subscriber()` sees every
///   envelope pushed after it was created
/// - Envelopes are stored in an append-only log
/// - Each subscriber tracks its own read position and its own closed flag
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use live_mirror::{ChangeEnvelope, ChangeStream, InMemoryChangeFeed};
///
/// let feed = InMemoryChangeFeed::new();
/// let sub = feed.new_subscriber();
///
/// feed.push(ChangeEnvelope::removed("evt-1", "m-1"));
///
/// let envelope = sub.poll(Duration::from_millis(10)).unwrap().unwrap();
/// assert_eq!(envelope.event_type, "DELETE");
/// ```
#[derive(Clone)]
pub struct InMemoryChangeFeed {
    /// Shared envelope log
    log: Arc<RwLock<Vec<ChangeEnvelope>>>,
    /// Per-subscriber read position
    position: Arc<Mutex<usize>>,
    /// Per-subscriber closed flag
    closed: Arc<AtomicBool>,
}

impl Default for InMemoryChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChangeFeed {
    /// Create a new, empty feed.
    pub fn new() -> Self {
        Self {
            log: Arc::new(RwLock::new(Vec::new())),
            position: Arc::new(Mutex::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a subscriber that shares the log and starts at its current end.
    ///
    /// Like a realtime channel, a subscriber only sees changes that happen
    /// after it joined; earlier state comes from the bulk fetch.
    pub fn new_subscriber(&self) -> Self {
        let start = self.len();
        Self {
            log: Arc::clone(&self.log),
            position: Arc::new(Mutex::new(start)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a subscriber that replays the whole log from the beginning.
    pub fn replay_subscriber(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
            position: Arc::new(Mutex::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Append an envelope for every subscriber.
    pub fn push(&self, envelope: ChangeEnvelope) {
        self.log_mut().push(envelope);
    }

    /// Append several envelopes at once.
    pub fn push_batch(&self, envelopes: Vec<ChangeEnvelope>) {
        self.log_mut().extend(envelopes);
    }

    /// Get all envelopes in the log.
    pub fn envelopes(&self) -> Vec<ChangeEnvelope> {
        self.log_ref().clone()
    }

    /// The most recently pushed envelope.
    pub fn last(&self) -> Option<ChangeEnvelope> {
        self.log_ref().last().cloned()
    }

    /// Get the total number of envelopes in the log.
    pub fn len(&self) -> usize {
        self.log_ref().len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.log_ref().is_empty()
    }

    /// Get this subscriber's read position.
    pub fn current_position(&self) -> usize {
        *self.position.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn log_ref(&self) -> std::sync::RwLockReadGuard<'_, Vec<ChangeEnvelope>> {
        self.log.read().unwrap_or_else(|e| e.into_inner())
    }

    fn log_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ChangeEnvelope>> {
        self.log.write().unwrap_or_else(|e| e.into_inner())
    }

    fn next(&self) -> Option<ChangeEnvelope> {
        let log = self.log_ref();
        let mut pos = self.position.lock().unwrap_or_else(|e| e.into_inner());
        if *pos < log.len() {
            let envelope = log[*pos].clone();
            *pos += 1;
            Some(envelope)
        } else {
            None
        }
    }
}

impl ChangeStream for InMemoryChangeFeed {
    fn poll(&self, timeout: Duration) -> Result<Option<ChangeEnvelope>, StreamError> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_closed() {
                return Err(StreamError::Closed);
            }

            if let Some(envelope) = self.next() {
                return Ok(Some(envelope));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
