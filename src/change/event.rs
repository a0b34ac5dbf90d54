use serde::{Deserialize, Serialize};

use super::{ChangeEnvelope, DecodeError};
use crate::record::Record;

/// A single remote mutation of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent<R> {
    Inserted(R),
    Updated(R),
    Removed(String),
}

/// Key-only image of a deleted row.
#[derive(Serialize, Deserialize)]
pub(super) struct OldRow {
    pub(super) id: String,
}

#[derive(Deserialize)]
struct RawChange<R> {
    new: Option<R>,
    old: Option<OldRow>,
}

impl<R> ChangeEvent<R> {
    /// The id of the record this event touches.
    pub fn id(&self) -> &str
    where
        R: Record,
    {
        match self {
            ChangeEvent::Inserted(record) | ChangeEvent::Updated(record) => record.id(),
            ChangeEvent::Removed(id) => id,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Inserted(_) => "inserted",
            ChangeEvent::Updated(_) => "updated",
            ChangeEvent::Removed(_) => "removed",
        }
    }
}

impl<R: Record> ChangeEvent<R> {
    /// Decode a platform envelope into a typed event.
    pub fn decode(envelope: &ChangeEnvelope) -> Result<Self, DecodeError> {
        let raw: RawChange<R> = serde_json::from_slice(&envelope.payload)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        match envelope.event_type.as_str() {
            ChangeEnvelope::INSERT => raw
                .new
                .map(ChangeEvent::Inserted)
                .ok_or(DecodeError::MissingRow("new")),
            ChangeEnvelope::UPDATE => raw
                .new
                .map(ChangeEvent::Updated)
                .ok_or(DecodeError::MissingRow("new")),
            ChangeEnvelope::DELETE => raw
                .old
                .map(|old| ChangeEvent::Removed(old.id))
                .ok_or(DecodeError::MissingRow("old")),
            other => Err(DecodeError::UnknownEventType(other.to_string())),
        }
    }
}
