//! Platform - the hosted backend a mirror synchronizes against.
//!
//! The platform owns durability, id assignment and change delivery. A mirror
//! only needs three capabilities from it, captured by [`CollectionSource`]:
//!
//! - `fetch_all()`: one-shot read of the current collection state
//! - `changes()`: open a live change stream for one subscriber
//! - `submit()`: durably insert a record; the resulting INSERT is delivered
//!   to every open stream, including the submitter's
//!
//! Construct one platform handle at application start and pass it (usually as
//! an `Arc`) to whatever needs it.

mod in_memory;

use crate::error::{FetchError, SubmitError};
use crate::record::Record;
use crate::stream::ChangeStream;

pub use in_memory::InMemoryPlatform;

/// Capabilities a live mirror consumes from the platform.
pub trait CollectionSource<R: Record>: Send + Sync {
    /// Client-side payload accepted by `submit`.
    type Draft;
    /// Change stream handed to each subscriber.
    type Stream: ChangeStream + 'static;

    /// Read every record currently in the collection, in any order.
    fn fetch_all(&self) -> Result<Vec<R>, FetchError>;

    /// Persist a new record built from `draft`.
    fn submit(&self, draft: Self::Draft) -> Result<R, SubmitError>;

    /// Open a change stream that sees every change made from now on.
    fn changes(&self) -> Self::Stream;
}

impl<R: Record, P: CollectionSource<R> + ?Sized> CollectionSource<R> for std::sync::Arc<P> {
    type Draft = P::Draft;
    type Stream = P::Stream;

    fn fetch_all(&self) -> Result<Vec<R>, FetchError> {
        (**self).fetch_all()
    }

    fn submit(&self, draft: Self::Draft) -> Result<R, SubmitError> {
        (**self).submit(draft)
    }

    fn changes(&self) -> Self::Stream {
        (**self).changes()
    }
}
