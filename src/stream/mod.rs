//! Change streams - the live feed of remote mutations.
//!
//! ```text
//! ┌──────────────────┐   push    ┌──────────────────────┐   poll   ┌──────────────────┐
//! │ platform (store) │ ────────▶ │ change feed (log)    │ ───────▶ │ subscription     │
//! │ insert/update/.. │           │ one position per sub │          │ decode + apply   │
//! └──────────────────┘           └──────────────────────┘          └──────────────────┘
//! ```
//!
//! Delivery is at-least-once with no ordering guarantee. A stream is held
//! open for the lifetime of the observing view and released with `close()`.

mod in_memory;

use std::fmt;
use std::time::Duration;

use crate::change::ChangeEnvelope;

pub use in_memory::InMemoryChangeFeed;

/// Error type for change stream operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream was closed and will deliver nothing more.
    Closed,
    /// The transport failed; the poll may be retried.
    Transport(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Closed => write!(f, "change stream closed"),
            StreamError::Transport(msg) => write!(f, "change stream transport error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}

/// Pull-based consumer side of a change stream.
pub trait ChangeStream: Send + Sync {
    /// Wait up to `timeout` for the next envelope.
    ///
    /// Returns `Ok(None)` when nothing arrived in time, `Err(StreamError::Closed)`
    /// once the stream has been closed.
    fn poll(&self, timeout: Duration) -> Result<Option<ChangeEnvelope>, StreamError>;

    /// Release the stream. Idempotent.
    fn close(&self);

    /// Whether `close()` has been called.
    fn is_closed(&self) -> bool;
}

impl<S: ChangeStream + ?Sized> ChangeStream for Box<S> {
    fn poll(&self, timeout: Duration) -> Result<Option<ChangeEnvelope>, StreamError> {
        (**self).poll(timeout)
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
