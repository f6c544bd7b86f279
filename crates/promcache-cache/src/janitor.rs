//! Background size-based eviction.
//!
//! LRU capacity bounds how many entries the cache holds; the janitor bounds
//! how large any single entry may grow. On every tick it walks the store
//! without touching recency and removes entries whose estimated size
//! exceeds `max_item_bytes`, plus pending entries whose loader never came
//! back. A panic inside a sweep restarts the sweep loop instead of ending
//! cache maintenance.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::cacher::Cacher;
use crate::entry::Shape;

/// Delay before restarting a sweep loop that panicked.
const RESTART_DELAY: Duration = Duration::from_millis(100);

/// Shortest sweep period; `tokio::time::interval` rejects zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// What one sweep removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub oversized: Vec<String>,
    pub stale_pending: Vec<String>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.oversized.len() + self.stale_pending.len()
    }
}

impl Cacher {
    /// Run one janitor pass now.
    pub fn sweep(&self) -> SweepReport {
        let max_bytes = self.config().max_item_bytes;
        let pending_ttl = self.config().pending_ttl();
        let mut report = SweepReport::default();

        for key in self.store().keys() {
            let entry = match self.store().peek(&key) {
                Some(entry) => entry,
                None => continue,
            };
            report.scanned += 1;

            let (shape, size, points) = {
                let state = entry.read();
                (state.shape, self.estimator().estimate(&state), state.point_count())
            };

            if shape == Shape::Pending {
                if entry.age() > pending_ttl && self.store().remove_if_same(&key, &entry) {
                    entry.signal().fire();
                    info!(
                        "Cache item removed: {}, pending for {}s",
                        key,
                        entry.age().as_secs()
                    );
                    report.stale_pending.push(key);
                }
                continue;
            }

            if size > max_bytes && self.store().remove_if_same(&key, &entry) {
                info!(
                    "Cache item removed: {}, estimated size: {} bytes ({} points)",
                    key, size, points
                );
                report.oversized.push(key);
            }
        }

        self.counters()
            .record_janitor_evictions(report.removed() as u64);
        debug!(
            "Janitor sweep: scanned={}, removed={}",
            report.scanned,
            report.removed()
        );
        report
    }

    /// Start the janitor on the configured sweep interval.
    pub fn start_janitor(self: &Arc<Self>) -> JanitorHandle {
        let period = self.config().sweep_interval();
        spawn_janitor(self, period)
    }
}

/// Handle to a running janitor. Dropping it stops the janitor.
pub struct JanitorHandle {
    shutdown: watch::Sender<bool>,
    supervisor: Option<JoinHandle<()>>,
}

impl JanitorHandle {
    /// Stop the janitor and wait for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.supervisor
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for JanitorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Start the janitor with an explicit period.
///
/// The janitor holds only a weak reference; it exits on its own once the
/// cache is dropped. Periods below one millisecond are raised to it.
pub fn spawn_janitor(cacher: &Arc<Cacher>, period: Duration) -> JanitorHandle {
    let period = period.max(MIN_PERIOD);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let weak = Arc::downgrade(cacher);

    let supervisor = tokio::spawn(async move {
        info!("Cache janitor started, sweeping every {}s", period.as_secs_f64());
        loop {
            let worker = tokio::spawn(run_sweeps(weak.clone(), period, shutdown_rx.clone()));
            match worker.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    error!("Cache janitor panicked, restarting: {}", e);
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    tokio::time::sleep(RESTART_DELAY).await;
                }
                Err(e) => {
                    error!("Cache janitor task ended: {}", e);
                    break;
                }
            }
        }
        info!("Cache janitor stopped");
    });

    JanitorHandle {
        shutdown,
        supervisor: Some(supervisor),
    }
}

async fn run_sweeps(cacher: Weak<Cacher>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; sweeps start one period in.
    ticker.tick().await;

    loop {
        if *shutdown.borrow() {
            return;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => return,
        }
        match cacher.upgrade() {
            Some(cacher) => {
                cacher.sweep();
            }
            None => return,
        }
    }
}
