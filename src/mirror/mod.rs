//! Mirror - the client-side ordered copy of a remote collection.
//!
//! Records are unique by id and kept ascending by `created_at`. Records that
//! share a timestamp keep the order in which they were placed. Every
//! operation is idempotent under redelivery of the same change.

use crate::change::ChangeEvent;
use crate::record::{Record, Timestamp};

/// What applying one change did to the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new record was placed.
    Inserted,
    /// An existing record was overwritten at its current position.
    Replaced,
    /// An existing record was overwritten and repositioned because its
    /// timestamp changed.
    Moved,
    /// A record was removed.
    Removed,
    /// Nothing to do (removal of an absent id).
    Unchanged,
}

/// Ordered, id-unique sequence of records.
#[derive(Debug, Clone)]
pub struct Mirror<R> {
    records: Vec<R>,
}

impl<R> Default for Mirror<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: Record> Mirror<R> {
    /// Create an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole contents with a bulk-fetch result.
    ///
    /// Duplicate ids keep the occurrence with the latest timestamp.
    pub fn replace_all(&mut self, mut records: Vec<R>) {
        records.sort_by_key(|r| r.created_at());

        let mut seen = std::collections::HashSet::with_capacity(records.len());
        let mut deduped: Vec<R> = Vec::with_capacity(records.len());
        for record in records.into_iter().rev() {
            if seen.insert(record.id().to_string()) {
                deduped.push(record);
            }
        }
        deduped.reverse();

        self.records = deduped;
    }

    /// Apply one change.
    pub fn apply(&mut self, event: ChangeEvent<R>) -> Applied {
        match event {
            ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => self.upsert(record),
            ChangeEvent::Removed(id) => self.remove(&id),
        }
    }

    /// Insert or overwrite a record, keeping the order invariant.
    pub fn upsert(&mut self, record: R) -> Applied {
        match self.position(record.id()) {
            Some(index) if self.records[index].created_at() == record.created_at() => {
                self.records[index] = record;
                Applied::Replaced
            }
            Some(index) => {
                self.records.remove(index);
                self.place(record);
                Applied::Moved
            }
            None => {
                self.place(record);
                Applied::Inserted
            }
        }
    }

    /// Remove a record by id. Absent ids are a no-op.
    pub fn remove(&mut self, id: &str) -> Applied {
        match self.position(id) {
            Some(index) => {
                self.records.remove(index);
                Applied::Removed
            }
            None => Applied::Unchanged,
        }
    }

    fn place(&mut self, record: R) {
        let index = self.insertion_point(record.created_at());
        self.records.insert(index, record);
    }

    /// Index after every record with `created_at <= at`.
    fn insertion_point(&self, at: Timestamp) -> usize {
        self.records.partition_point(|r| r.created_at() <= at)
    }

    /// Index of the record with the given id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<&R> {
        self.position(id).map(|index| &self.records[index])
    }

    /// The records in order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the ordering invariant holds (used by tests and debug asserts).
    pub fn is_sorted(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].created_at() <= pair[1].created_at())
    }
}
