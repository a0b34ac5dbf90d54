//! Observer that records every snapshot and lets tests wait for one.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use live_mirror::Record;

pub const WAIT: Duration = Duration::from_secs(2);

pub struct Recorder<R> {
    snapshots: Arc<(Mutex<Vec<Vec<R>>>, Condvar)>,
}

impl<R> Clone for Recorder<R> {
    fn clone(&self) -> Self {
        Self {
            snapshots: Arc::clone(&self.snapshots),
        }
    }
}

impl<R: Record> Recorder<R> {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new((Mutex::new(Vec::new()), Condvar::new())),
        }
    }

    /// Observer closure to hand to a sync.
    pub fn observer(&self) -> impl Fn(&[R]) + Send + Sync + 'static {
        let snapshots = Arc::clone(&self.snapshots);
        move |records: &[R]| {
            let (lock, cvar) = &*snapshots;
            lock.lock().unwrap().push(records.to_vec());
            cvar.notify_all();
        }
    }

    pub fn calls(&self) -> usize {
        self.snapshots.0.lock().unwrap().len()
    }

    pub fn last_ids(&self) -> Option<Vec<String>> {
        self.snapshots
            .0
            .lock()
            .unwrap()
            .last()
            .map(|records| ids(records))
    }

    /// Block until the latest snapshot satisfies `pred`.
    pub fn wait_for(&self, pred: impl Fn(&[R]) -> bool) -> Vec<R> {
        let (lock, cvar) = &*self.snapshots;
        let deadline = Instant::now() + WAIT;
        let mut guard = lock.lock().unwrap();
        loop {
            if let Some(last) = guard.last() {
                if pred(last.as_slice()) {
                    return last.clone();
                }
            }
            let now = Instant::now();
            assert!(now < deadline, "timed out waiting for snapshot");
            guard = cvar.wait_timeout(guard, deadline - now).unwrap().0;
        }
    }

    /// Block until exactly `ids` (in order) is the latest snapshot.
    pub fn wait_for_ids(&self, expected: &[&str]) -> Vec<R> {
        self.wait_for(|records| ids(records) == expected)
    }

    /// Block until at least `n` snapshots have been recorded.
    pub fn wait_for_calls(&self, n: usize) {
        let (lock, cvar) = &*self.snapshots;
        let deadline = Instant::now() + WAIT;
        let mut guard = lock.lock().unwrap();
        while guard.len() < n {
            let now = Instant::now();
            assert!(now < deadline, "timed out waiting for {} snapshots", n);
            guard = cvar.wait_timeout(guard, deadline - now).unwrap().0;
        }
    }
}

pub fn ids<R: Record>(records: &[R]) -> Vec<String> {
    records.iter().map(|r| r.id().to_string()).collect()
}
