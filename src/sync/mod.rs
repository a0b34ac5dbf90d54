//! LiveCollectionSync - keeps a [`Mirror`] consistent with a remote collection.
//!
//! The sync is seeded once from a bulk fetch and then mutated by change
//! events for as long as a subscription is open. After every mutation the
//! observer receives the full ordered snapshot so the caller can re-render.
//!
//! ## Example
//!
//! ```ignore
//! use live_mirror::{InMemoryPlatform, LiveCollectionSync, CollectionSource};
//!
//! let platform = InMemoryPlatform::<ChatMessage>::new();
//! let sync = LiveCollectionSync::new(|messages: &[ChatMessage]| render(messages));
//!
//! sync.initialize(|| platform.fetch_all())?;
//! let handle = sync.subscribe(platform.changes());
//!
//! // The new message reaches the mirror through the INSERT event only.
//! sync.publish(|draft| platform.submit(draft), NewChatMessage::new("u-1", "hi", None))?;
//!
//! sync.cancel(&handle);
//! ```
//!
//! Local writes never touch the mirror directly: the platform's INSERT event,
//! delivered to every subscriber including the writer, is the only way a new
//! record gets in.

#[cfg(feature = "tokio")]
mod channel;
mod subscription;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::change::{ChangeEnvelope, ChangeEvent};
use crate::config::SyncConfig;
use crate::error::{FetchError, SubmitError};
use crate::mirror::{Applied, Mirror};
use crate::platform::CollectionSource;
use crate::record::Record;
use crate::stream::ChangeStream;

use subscription::{bump, spawn_worker, DeliveryMarker};
pub use subscription::{SubscriptionHandle, SubscriptionStats};

/// Callback receiving the ordered mirror contents after every mutation.
///
/// The observer runs on the delivering thread while deliveries into this sync
/// are held back. It may call `snapshot()` and cancel subscriptions, but must
/// not call `initialize()`. A panicking observer is logged and counted; the
/// subscription keeps running.
pub type Observer<R> = Box<dyn Fn(&[R]) + Send + Sync>;

pub(crate) struct Shared<R> {
    mirror: Mutex<Mirror<R>>,
    /// Serializes every mutation-plus-notification into this mirror.
    delivery: Arc<Mutex<()>>,
    observer: Observer<R>,
    config: SyncConfig,
    initialized: AtomicBool,
    next_subscription: AtomicU64,
}

impl<R: Record> Shared<R> {
    fn collection(&self) -> &str {
        self.config.collection_or(R::COLLECTION)
    }

    fn lock_mirror(&self) -> MutexGuard<'_, Mirror<R>> {
        self.mirror.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Call the observer. Returns false if it panicked; the panic is logged and swallowed.
    fn notify(&self, snapshot: &[R]) -> bool {
        let _marker = DeliveryMarker::enter(Arc::as_ptr(&self.delivery) as usize);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.observer)(snapshot)));
        if let Err(payload) = outcome {
            warn!(
                "{} observer panicked: {}",
                self.collection(),
                panic_message(payload.as_ref())
            );
            return false;
        }
        true
    }

    /// Apply one event unless `cancelled` is set. Returns `None` when cancelled.
    fn deliver(
        &self,
        cancelled: &AtomicBool,
        event: ChangeEvent<R>,
        stats: &Mutex<SubscriptionStats>,
    ) -> Option<Applied> {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        if cancelled.load(Ordering::SeqCst) {
            return None;
        }

        let (applied, snapshot) = {
            let mut mirror = self.lock_mirror();
            let applied = mirror.apply(event);
            debug_assert!(mirror.is_sorted());
            (applied, mirror.records().to_vec())
        };
        bump(stats, |s| s.events_applied += 1);

        if !self.notify(&snapshot) {
            bump(stats, |s| s.observer_panics += 1);
        }

        Some(applied)
    }

    /// Decode and apply one envelope. Returns false once the subscription is cancelled.
    fn handle_envelope(
        &self,
        cancelled: &AtomicBool,
        envelope: &ChangeEnvelope,
        stats: &Mutex<SubscriptionStats>,
    ) -> bool {
        let event = match ChangeEvent::<R>::decode(envelope) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    "ignoring undecodable {} change {} ({}): {}",
                    self.collection(),
                    envelope.id,
                    envelope.event_type,
                    err
                );
                bump(stats, |s| s.events_ignored += 1);
                return true;
            }
        };

        let kind = event.kind();
        let id = event.id().to_string();
        match self.deliver(cancelled, event, stats) {
            Some(applied) => {
                debug!(
                    "{} change {} {} {}: {:?}",
                    self.collection(),
                    envelope.id,
                    kind,
                    id,
                    applied
                );
                true
            }
            None => false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Client-side live mirror of a remote collection.
pub struct LiveCollectionSync<R> {
    shared: Arc<Shared<R>>,
}

impl<R: Record> LiveCollectionSync<R> {
    /// Create an empty sync with default configuration.
    pub fn new<F>(observer: F) -> Self
    where
        F: Fn(&[R]) + Send + Sync + 'static,
    {
        Self::with_config(SyncConfig::default(), observer)
    }

    /// Create an empty sync.
    pub fn with_config<F>(config: SyncConfig, observer: F) -> Self
    where
        F: Fn(&[R]) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                mirror: Mutex::new(Mirror::new()),
                delivery: Arc::new(Mutex::new(())),
                observer: Box::new(observer),
                config,
                initialized: AtomicBool::new(false),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Seed the mirror from a bulk fetch.
    ///
    /// On success the records are sorted by `created_at`, replace the mirror
    /// wholesale and the observer is notified. On failure the mirror is left
    /// as it was and the error is returned; retrying is up to the caller.
    ///
    /// Meant to be called once, before `subscribe`.
    pub fn initialize<F>(&self, fetch_all: F) -> Result<(), FetchError>
    where
        F: FnOnce() -> Result<Vec<R>, FetchError>,
    {
        if self.shared.initialized.load(Ordering::SeqCst) {
            warn!("{} mirror initialized more than once", self.shared.collection());
        }

        let records = fetch_all().map_err(|err| {
            warn!("{} bulk fetch failed: {}", self.shared.collection(), err);
            err
        })?;

        let _delivery = self
            .shared
            .delivery
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let snapshot = {
            let mut mirror = self.shared.lock_mirror();
            mirror.replace_all(records);
            mirror.records().to_vec()
        };
        self.shared.initialized.store(true, Ordering::SeqCst);
        info!(
            "{} mirror initialized with {} records",
            self.shared.collection(),
            snapshot.len()
        );
        self.shared.notify(&snapshot);

        Ok(())
    }

    /// Seed the mirror from a platform's `fetch_all`.
    pub fn initialize_from<P>(&self, source: &P) -> Result<(), FetchError>
    where
        P: CollectionSource<R>,
    {
        self.initialize(|| source.fetch_all())
    }

    /// Start consuming `stream` on a background thread.
    ///
    /// Events are applied in arrival order. Call once per sync; a second
    /// subscription delivers into the same mirror independently.
    pub fn subscribe<S>(&self, stream: S) -> SubscriptionHandle
    where
        S: ChangeStream + 'static,
    {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::SeqCst);
        let stream = Arc::new(stream);
        let cancelled = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(SubscriptionStats::default()));

        let worker = spawn_worker(
            Arc::clone(&self.shared),
            Arc::clone(&stream),
            id,
            Arc::clone(&cancelled),
            Arc::clone(&stats),
        );

        SubscriptionHandle::new(
            id,
            self.shared.config.name.clone(),
            cancelled,
            Arc::clone(&self.shared.delivery),
            Box::new(move || stream.close()),
            Some(worker),
            stats,
        )
    }

    /// Subscribe to a platform's change stream.
    pub fn subscribe_to<P>(&self, source: &P) -> SubscriptionHandle
    where
        P: CollectionSource<R>,
    {
        self.subscribe(source.changes())
    }

    /// Forward a new record's payload to the store.
    ///
    /// The mirror is not touched; the record arrives through the platform's
    /// INSERT event like everybody else's.
    pub fn publish<P, F>(&self, submit: F, payload: P) -> Result<(), SubmitError>
    where
        F: FnOnce(P) -> Result<R, SubmitError>,
    {
        match submit(payload) {
            Ok(record) => {
                debug!(
                    "{} record {} submitted",
                    self.shared.collection(),
                    record.id()
                );
                Ok(())
            }
            Err(err) => {
                warn!("{} submit failed: {}", self.shared.collection(), err);
                Err(err)
            }
        }
    }

    /// Submit a draft through a platform.
    pub fn publish_to<P>(&self, source: &P, draft: P::Draft) -> Result<(), SubmitError>
    where
        P: CollectionSource<R>,
    {
        self.publish(|draft| source.submit(draft), draft)
    }

    /// Release a subscription. Idempotent.
    pub fn cancel(&self, handle: &SubscriptionHandle) {
        handle.cancel();
    }

    /// Whether `initialize` has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
    }

    /// Copy of the current ordered contents.
    pub fn snapshot(&self) -> Vec<R> {
        self.shared.lock_mirror().records().to_vec()
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<R> {
        self.shared.lock_mirror().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shared.lock_mirror().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock_mirror().is_empty()
    }
}
