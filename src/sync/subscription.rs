//! Subscription handles and the background delivery loop.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use super::Shared;
use crate::record::Record;
use crate::stream::{ChangeStream, StreamError};

/// Counters kept by a subscription.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Change events applied to the mirror.
    pub events_applied: usize,
    /// Envelopes that could not be decoded and were skipped.
    pub events_ignored: usize,
    /// Transient stream errors (polling continued).
    pub stream_errors: usize,
    /// Poll cycles completed.
    pub polls: usize,
    /// Observer calls that panicked after the event was applied.
    pub observer_panics: usize,
}

thread_local! {
    /// Delivery lock key of the sync whose observer is running on this thread.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as inside an observer callback for `key`.
pub(super) struct DeliveryMarker {
    previous: usize,
}

impl DeliveryMarker {
    pub(super) fn enter(key: usize) -> Self {
        let previous = DELIVERING.with(|d| d.replace(key));
        Self { previous }
    }
}

impl Drop for DeliveryMarker {
    fn drop(&mut self) {
        DELIVERING.with(|d| d.set(self.previous));
    }
}

fn delivering_on_current_thread(key: usize) -> bool {
    DELIVERING.with(|d| d.get() == key)
}

/// An open stream consumption that can be cancelled.
///
/// Cancelling is idempotent and may happen from any thread, including from
/// inside the observer callback. Once `cancel()` returns, the observer is not
/// called again for this subscription. Dropping the handle cancels it.
pub struct SubscriptionHandle {
    id: u64,
    name: String,
    cancelled: Arc<AtomicBool>,
    delivery: Arc<Mutex<()>>,
    release: Box<dyn Fn() + Send + Sync>,
    worker: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<Mutex<SubscriptionStats>>,
}

impl SubscriptionHandle {
    pub(super) fn new(
        id: u64,
        name: String,
        cancelled: Arc<AtomicBool>,
        delivery: Arc<Mutex<()>>,
        release: Box<dyn Fn() + Send + Sync>,
        worker: Option<JoinHandle<()>>,
        stats: Arc<Mutex<SubscriptionStats>>,
    ) -> Self {
        Self {
            id,
            name,
            cancelled,
            delivery,
            release,
            worker: Mutex::new(worker),
            stats,
        }
    }

    /// Identifier of this subscription, unique within its sync.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Current counters.
    pub fn stats(&self) -> SubscriptionStats {
        self.stats.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Release the stream and stop deliveries.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }

        (self.release)();

        let key = Arc::as_ptr(&self.delivery) as usize;
        if delivering_on_current_thread(key) {
            // We are inside an observer of this sync: the delivery lock is
            // held by our own caller and the flag stops every later delivery.
            info!("subscription {} ({}) cancelled from observer", self.id, self.name);
            return;
        }

        // Wait out a delivery in flight on another thread.
        drop(self.delivery.lock().unwrap_or_else(|e| e.into_inner()));

        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(worker) = worker {
            // Dropped by its own worker (last owner of the observer): nothing to wait for.
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!("subscription {} ({}) worker panicked", self.id, self.name);
            }
        }

        info!("subscription {} ({}) cancelled", self.id, self.name);
    }

    /// Cancel and return the final counters.
    pub fn stop(self) -> SubscriptionStats {
        self.cancel();
        self.stats()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Spawn the thread that polls `stream` and feeds the mirror.
pub(super) fn spawn_worker<R, S>(
    shared: Arc<Shared<R>>,
    stream: Arc<S>,
    id: u64,
    cancelled: Arc<AtomicBool>,
    stats: Arc<Mutex<SubscriptionStats>>,
) -> JoinHandle<()>
where
    R: Record,
    S: ChangeStream + 'static,
{
    let interval = shared.config.poll_interval();

    thread::spawn(move || {
        info!(
            "subscription {} ({}) started on {}",
            id,
            shared.config.name,
            shared.collection()
        );

        loop {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }

            bump(&stats, |s| s.polls += 1);

            match stream.poll(interval) {
                Ok(Some(envelope)) => {
                    if !shared.handle_envelope(&cancelled, &envelope, &stats) {
                        break;
                    }
                }
                Ok(None) => {
                    // Nothing arrived, keep polling
                }
                Err(StreamError::Closed) => {
                    debug!("subscription {} stream closed", id);
                    break;
                }
                Err(err) => {
                    bump(&stats, |s| s.stream_errors += 1);
                    warn!("subscription {} poll failed: {}", id, err);
                    thread::sleep(interval);
                }
            }
        }
    })
}

pub(super) fn bump(stats: &Mutex<SubscriptionStats>, f: impl FnOnce(&mut SubscriptionStats)) {
    f(&mut stats.lock().unwrap_or_else(|e| e.into_inner()));
}
