//! Cache entry: cached window, payload, and the one-shot load signal.

use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use promcache_core::Matrix;
use tokio::sync::watch;

use crate::reconcile::TimeRange;

/// What an entry currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Created by a fetch miss; the loader has not merged yet.
    Pending,
    /// Loaded from an instant query. Stored as one-point series, read back
    /// through exact-timestamp lookup.
    Instant,
    /// Loaded from a range query.
    Range,
}

/// Mutable part of an entry, guarded by the entry lock.
#[derive(Debug, Clone)]
pub struct EntryState {
    pub window: TimeRange,
    pub step: i64,
    pub shape: Shape,
    pub payload: Matrix,
}

impl EntryState {
    fn pending() -> Self {
        Self {
            window: TimeRange::new(0, 0),
            step: 0,
            shape: Shape::Pending,
            payload: Vec::new(),
        }
    }

    pub fn point_count(&self) -> usize {
        self.payload.iter().map(|s| s.points.len()).sum()
    }
}

/// Write-once completion flag that many readers can wait on.
pub struct LoadSignal {
    tx: watch::Sender<bool>,
}

impl LoadSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Fire the signal. Returns `true` only for the call that fired it;
    /// later calls are no-ops.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until fired or `timeout` elapses. Returns whether it fired.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let fired = match tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await {
            Ok(result) => result.is_ok(),
            Err(_) => false,
        };
        fired
    }
}

impl Default for LoadSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// One cached query result.
pub struct Entry {
    state: RwLock<EntryState>,
    signal: LoadSignal,
    created_at: Instant,
}

impl Entry {
    /// Empty entry awaiting its first merge.
    pub fn pending() -> Self {
        Self {
            state: RwLock::new(EntryState::pending()),
            signal: LoadSignal::new(),
            created_at: Instant::now(),
        }
    }

    /// Shared lock for reads.
    pub fn read(&self) -> RwLockReadGuard<'_, EntryState> {
        self.state.read()
    }

    /// Exclusive lock; merges hold it for the whole payload update.
    pub fn write(&self) -> RwLockWriteGuard<'_, EntryState> {
        self.state.write()
    }

    pub fn signal(&self) -> &LoadSignal {
        &self.signal
    }

    pub fn is_pending(&self) -> bool {
        self.state.read().shape == Shape::Pending
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
