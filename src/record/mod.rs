//! Records - the items of a synchronized collection.
//!
//! A record is identified by an opaque id assigned by the store and ordered
//! by its creation timestamp. Everything else on the type is payload the
//! mirror never looks at.
//!
//! ## Example
//!
//! ```ignore
//! use live_mirror::Record;
//!
//! #[derive(Serialize, Deserialize, Clone, Record)]
//! #[record(collection = "messages")]
//! struct ChatMessage {
//!     #[record(id)]
//!     pub id: String,
//!     #[record(created_at)]
//!     pub created_at: u64,
//!     pub content: String,
//! }
//! ```

use serde::{de::DeserializeOwned, Serialize};

/// Creation time in milliseconds, assigned by the store. The sole sort key.
pub type Timestamp = u64;

/// Trait for types that can live in a mirror.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The remote collection (table) this record type belongs to.
    const COLLECTION: &'static str;

    /// Returns the unique identifier for this record.
    fn id(&self) -> &str;

    /// Returns the creation timestamp used for ordering.
    fn created_at(&self) -> Timestamp;
}

/// Records the store can materialize from a client-side draft.
///
/// The store owns id and timestamp assignment; the draft carries only the
/// application fields.
pub trait Insertable: Record {
    type Draft: Send;

    fn materialize(id: String, created_at: Timestamp, draft: Self::Draft) -> Self;
}
