//! InMemoryPlatform - HashMap-backed collection with a change feed, for
//! testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use super::CollectionSource;
use crate::change::ChangeEnvelope;
use crate::error::{FetchError, SubmitError};
use crate::record::{Insertable, Timestamp};
use crate::stream::InMemoryChangeFeed;

/// One-shot failures armed by tests.
#[derive(Default)]
struct Faults {
    fetch: Option<FetchError>,
    submit: Option<SubmitError>,
}

/// In-memory collection that behaves like the hosted platform:
///
/// - assigns ids (UUID v4) and strictly increasing `created_at` values
/// - publishes an envelope to every open change stream after each write
/// - can be told to fail the next fetch or submit, or to redeliver the last
///   change (at-least-once delivery)
///
/// Clone-friendly via Arc; clones share storage and feed.
pub struct InMemoryPlatform<R> {
    rows: Arc<RwLock<HashMap<String, R>>>,
    feed: InMemoryChangeFeed,
    clock: Arc<Mutex<Timestamp>>,
    sequence: Arc<AtomicU64>,
    faults: Arc<Mutex<Faults>>,
}

impl<R> Clone for InMemoryPlatform<R> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            feed: self.feed.clone(),
            clock: Arc::clone(&self.clock),
            sequence: Arc::clone(&self.sequence),
            faults: Arc::clone(&self.faults),
        }
    }
}

impl<R: Insertable> Default for InMemoryPlatform<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Insertable> InMemoryPlatform<R> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            feed: InMemoryChangeFeed::new(),
            clock: Arc::new(Mutex::new(0)),
            sequence: Arc::new(AtomicU64::new(0)),
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Store rows directly, without publishing changes (seed data).
    pub fn seed(&self, rows: impl IntoIterator<Item = R>) {
        let mut storage = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        for row in rows {
            *clock = (*clock).max(row.created_at());
            storage.insert(row.id().to_string(), row);
        }
    }

    /// Modify an existing row and publish an UPDATE.
    pub fn update(&self, id: &str, edit: impl FnOnce(&mut R)) -> Result<R, SubmitError> {
        let updated = {
            let mut storage = self.rows.write().unwrap_or_else(|e| e.into_inner());
            let row = storage.get_mut(id).ok_or_else(|| {
                SubmitError::Rejected(format!("no {} row with id {}", R::COLLECTION, id))
            })?;
            edit(row);
            row.clone()
        };

        let envelope = ChangeEnvelope::updated(self.next_event_id(), &updated)
            .map_err(|e| SubmitError::Platform(e.to_string()))?;
        self.publish(envelope);
        Ok(updated)
    }

    /// Delete a row and publish a DELETE. Returns whether the row existed.
    pub fn delete(&self, id: &str) -> Result<bool, SubmitError> {
        let existed = self
            .rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some();

        if existed {
            let envelope = ChangeEnvelope::removed(self.next_event_id(), id);
            self.publish(envelope);
        }
        Ok(existed)
    }

    /// Get a stored row by id.
    pub fn get(&self, id: &str) -> Option<R> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next `fetch_all` fail with `err`.
    pub fn fail_next_fetch(&self, err: FetchError) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).fetch = Some(err);
    }

    /// Make the next `submit` fail with `err`.
    pub fn fail_next_submit(&self, err: SubmitError) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).submit = Some(err);
    }

    /// Deliver the most recent change a second time.
    pub fn redeliver_last(&self) -> bool {
        match self.feed.last() {
            Some(envelope) => {
                self.feed.push(envelope);
                true
            }
            None => false,
        }
    }

    /// Push an arbitrary envelope to every stream (e.g. one the client cannot decode).
    pub fn push_raw(&self, envelope: ChangeEnvelope) {
        self.feed.push(envelope);
    }

    /// The underlying feed.
    pub fn feed(&self) -> &InMemoryChangeFeed {
        &self.feed
    }

    fn publish(&self, envelope: ChangeEnvelope) {
        self.feed.push(envelope.with_metadata("table", R::COLLECTION));
    }

    fn next_event_id(&self) -> String {
        format!("evt-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Wall-clock milliseconds, bumped so every call is strictly greater
    /// until the clock saturates at `Timestamp::MAX`.
    fn next_timestamp(&self) -> Timestamp {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Timestamp::try_from(d.as_millis()).unwrap_or(Timestamp::MAX))
            .unwrap_or_default();
        let mut clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        *clock = now.max(clock.saturating_add(1));
        *clock
    }
}

impl<R: Insertable> CollectionSource<R> for InMemoryPlatform<R> {
    type Draft = R::Draft;
    type Stream = InMemoryChangeFeed;

    fn fetch_all(&self) -> Result<Vec<R>, FetchError> {
        if let Some(err) = self.faults.lock().unwrap_or_else(|e| e.into_inner()).fetch.take() {
            return Err(err);
        }

        Ok(self
            .rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }

    fn submit(&self, draft: R::Draft) -> Result<R, SubmitError> {
        if let Some(err) = self.faults.lock().unwrap_or_else(|e| e.into_inner()).submit.take() {
            return Err(err);
        }

        let record = R::materialize(Uuid::new_v4().to_string(), self.next_timestamp(), draft);
        let envelope = ChangeEnvelope::inserted(self.next_event_id(), &record)
            .map_err(|e| SubmitError::Platform(e.to_string()))?;

        self.rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.id().to_string(), record.clone());
        self.publish(envelope);

        Ok(record)
    }

    fn changes(&self) -> InMemoryChangeFeed {
        self.feed.new_subscriber()
    }
}
