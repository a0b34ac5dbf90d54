//! Change events - remote mutations of a collection.
//!
//! The platform delivers each mutation as a [`ChangeEnvelope`]: an event type
//! (`INSERT`, `UPDATE`, `DELETE`) and a JSON payload carrying the new row image
//! and/or the old row's key. Envelopes are decoded into a typed
//! [`ChangeEvent`] before they reach a mirror.
//!
//! ```text
//! INSERT  {"new": {"id": "m-1", "created_at": 10, ...}}
//! UPDATE  {"new": {"id": "m-1", "created_at": 10, ...}, "old": {"id": "m-1"}}
//! DELETE  {"old": {"id": "m-1"}}
//! ```

mod envelope;
mod event;

use std::fmt;

pub use envelope::ChangeEnvelope;
pub use event::ChangeEvent;

/// Error type for turning an envelope into a [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The event type is not one of INSERT, UPDATE or DELETE.
    UnknownEventType(String),
    /// The payload is not valid JSON or the row does not match the record type.
    Malformed(String),
    /// The payload lacks the row image required by the event type.
    MissingRow(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownEventType(kind) => write!(f, "unknown change event type: {}", kind),
            DecodeError::Malformed(msg) => write!(f, "malformed change payload: {}", msg),
            DecodeError::MissingRow(which) => write!(f, "change payload has no `{}` row", which),
        }
    }
}

impl std::error::Error for DecodeError {}
