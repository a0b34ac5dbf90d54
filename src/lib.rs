//! Live mirrors of remote collections.
//!
//! A [`LiveCollectionSync`] keeps a client-side, ordered copy of a collection
//! held by a hosted platform. It is seeded once from a bulk fetch, then kept
//! current by a stream of insert/update/delete changes that may arrive more
//! than once and in any order. Every mutation is followed by a snapshot
//! handed to an observer, typically a view that re-renders.
//!
//! ```text
//! fetch_all() ──▶ initialize ──┐
//!                              ▼
//! changes()   ──▶ subscribe ──▶ Mirror (unique by id, sorted by created_at) ──▶ observer(&[R])
//!                              ▲
//! submit()    ◀── publish      │  (new records arrive only via INSERT)
//! ```

extern crate self as live_mirror;

pub mod change;
pub mod chat;
mod config;
mod error;
pub mod mirror;
pub mod platform;
mod record;
pub mod stream;
pub mod sync;

pub use change::{ChangeEnvelope, ChangeEvent, DecodeError};
pub use chat::{ChatMessage, ChatRoom, ChatUser, NewChatMessage};
pub use config::SyncConfig;
pub use error::{FetchError, SubmitError};
pub use mirror::{Applied, Mirror};
pub use platform::{CollectionSource, InMemoryPlatform};
pub use record::{Insertable, Record, Timestamp};
pub use stream::{ChangeStream, InMemoryChangeFeed, StreamError};
pub use sync::{LiveCollectionSync, Observer, SubscriptionHandle, SubscriptionStats};

// Derive macro, shares its name with the trait like serde's derives.
pub use live_mirror_macros::Record;
