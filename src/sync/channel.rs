//! Async delivery from a Tokio channel (feature `tokio`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use tokio::sync::mpsc;

use super::{LiveCollectionSync, SubscriptionHandle, SubscriptionStats};
use crate::change::ChangeEnvelope;
use crate::record::Record;

impl<R: Record> LiveCollectionSync<R> {
    /// Consume envelopes from a Tokio channel on a spawned task.
    ///
    /// Same semantics as [`subscribe`](Self::subscribe): arrival order,
    /// undecodable envelopes skipped, observer called after every applied
    /// event. Cancelling aborts the task, which drops the receiver. The
    /// subscription also ends when every sender is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe_channel(&self, mut rx: mpsc::Receiver<ChangeEnvelope>) -> SubscriptionHandle {
        let id = self.shared.next_subscription.fetch_add(1, Ordering::SeqCst);
        let cancelled = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(SubscriptionStats::default()));

        let shared = Arc::clone(&self.shared);
        let task_cancelled = Arc::clone(&cancelled);
        let task_stats = Arc::clone(&stats);

        let task = tokio::spawn(async move {
            info!(
                "subscription {} ({}) started on {} channel",
                id,
                shared.config.name,
                shared.collection()
            );

            while let Some(envelope) = rx.recv().await {
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                super::bump(&task_stats, |s| s.polls += 1);
                if !shared.handle_envelope(&task_cancelled, &envelope, &task_stats) {
                    break;
                }
            }

            debug!("subscription {} channel drained", id);
        });
        let abort = task.abort_handle();

        SubscriptionHandle::new(
            id,
            self.shared.config.name.clone(),
            cancelled,
            Arc::clone(&self.shared.delivery),
            Box::new(move || abort.abort()),
            None,
            stats,
        )
    }
}
