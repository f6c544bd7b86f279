//! Cache coordinator: fetch/merge state machine with single-flight loads.
//!
//! Per key an entry moves `Absent → Pending → Ready`. The first fetch of an
//! unseen key creates the pending entry and is told to query the backing
//! store; concurrent fetches for the same key wait on the entry's load
//! signal (bounded by the pending timeout) instead of issuing their own
//! upstream query. The loader's `merge` populates the entry and fires the
//! signal.

use std::sync::Arc;

use promcache_core::{
    vector_to_matrix, CacheConfig, Error, Matrix, QueryResult, Result, Sample, Value, ValueKind,
    Vector,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::entry::{Entry, EntryState, Shape};
use crate::extract::{extract, instant_at};
use crate::merge::{merge_matrix, merge_vector};
use crate::reconcile::{reconcile, Reconciliation, TimeRange};
use crate::size::{LogicalSizeEstimator, SizeEstimator};
use crate::stats::{CacheStats, CacheStatsSnapshot};
use crate::store::EntryStore;

/// Answer to a fetch.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The cache answered the whole request.
    Hit(Value),
    /// The caller must query `range` from the backing store and merge it.
    /// `cached` carries whatever part of the request the cache could serve.
    Miss {
        range: TimeRange,
        cached: Option<Matrix>,
        cause: Option<Error>,
    },
    /// Another caller's load did not finish in time. No data, and the caller
    /// is deliberately not told to fetch.
    Degraded(Error),
}

impl FetchOutcome {
    pub fn fetch_required(&self) -> bool {
        matches!(self, Self::Miss { .. })
    }

    pub fn fetch_range(&self) -> Option<TimeRange> {
        match self {
            Self::Miss { range, .. } => Some(*range),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Hit(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Query result cache shared by all request handlers.
pub struct Cacher {
    store: EntryStore,
    config: CacheConfig,
    estimator: Arc<dyn SizeEstimator>,
    stats: CacheStats,
}

impl Cacher {
    /// Create a cache with the default size estimator.
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::with_estimator(config, Arc::new(LogicalSizeEstimator))
    }

    /// Create a cache with a custom size estimator for the janitor.
    pub fn with_estimator(config: CacheConfig, estimator: Arc<dyn SizeEstimator>) -> Result<Self> {
        config.validate()?;
        info!(
            "Result cache initialized: max_entries={}, max_item_bytes={}, pending_timeout={}s",
            config.max_entries, config.max_item_bytes, config.pending_timeout_secs
        );
        Ok(Self {
            store: EntryStore::new(config.max_entries),
            config,
            estimator,
            stats: CacheStats::default(),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn store(&self) -> &EntryStore {
        &self.store
    }

    pub(crate) fn estimator(&self) -> &dyn SizeEstimator {
        self.estimator.as_ref()
    }

    pub(crate) fn counters(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Maximum number of entries before LRU eviction.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Drop every entry, waking anyone waiting on a pending one.
    pub fn clear(&self) {
        for entry in self.store.drain() {
            entry.signal().fire();
        }
        info!("Result cache cleared");
    }

    /// Copy of an entry's state, without touching recency.
    pub fn inspect(&self, key: &str) -> Option<EntryState> {
        self.store.peek(key).map(|entry| entry.read().clone())
    }

    // ---------------------------------------------------------------
    // Fetch
    // ---------------------------------------------------------------

    /// Look up `[start, end]` for `key`.
    ///
    /// Suspends only while another caller's load for the same key is in
    /// flight, and never longer than the configured pending timeout in total.
    pub async fn fetch(&self, key: &str, start: i64, end: i64) -> FetchOutcome {
        let request = TimeRange::new(start, end);
        let timeout = self.config.pending_timeout();
        let deadline = Instant::now() + timeout;

        loop {
            let (entry, created, evicted) = self.store.get_or_create_pending(key);
            if evicted.is_some() {
                self.stats.record_lru_eviction();
            }
            if created {
                self.stats.record_miss();
                debug!("Cache miss for {} [{}-{}], caller loads", key, start, end);
                return FetchOutcome::Miss {
                    range: request,
                    cached: None,
                    cause: Some(Error::KeyNotFound(key.to_string())),
                };
            }

            if !entry.is_pending() {
                return self.read_ready(key, &entry, request);
            }

            self.stats.record_pending_wait();
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !entry.signal().wait(remaining).await {
                self.stats.record_pending_timeout();
                warn!(
                    "Request [{}:{}-{}] waited {}ms for pending load, returning without data",
                    key,
                    start,
                    end,
                    timeout.as_millis()
                );
                return FetchOutcome::Degraded(Error::PendingTimeout {
                    key: key.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }

            // The load finished or was abandoned. Re-read: the entry may be
            // ready, gone, or replaced by a newer pending load.
            if let Some(current) = self.store.peek(key) {
                if Arc::ptr_eq(&current, &entry) && current.is_pending() {
                    // Fired without data (never expected); don't spin.
                    return FetchOutcome::Degraded(Error::KeyNotFound(key.to_string()));
                }
            }
            debug!("Request [{}:{}-{}] woke after pending load", key, start, end);
        }
    }

    fn read_ready(&self, key: &str, entry: &Entry, request: TimeRange) -> FetchOutcome {
        let state = entry.read();
        match state.shape {
            Shape::Pending => FetchOutcome::Degraded(Error::KeyNotFound(key.to_string())),
            Shape::Instant => match instant_lookup(&state, request.end) {
                Some(vector) => {
                    self.stats.record_hit();
                    debug!("Instant hit for {} at {}", key, request.end);
                    FetchOutcome::Hit(Value::Vector(vector))
                }
                None => {
                    self.stats.record_miss();
                    debug!("Instant miss for {} at {}, refetching all series", key, request.end);
                    FetchOutcome::Miss {
                        range: request,
                        cached: None,
                        cause: None,
                    }
                }
            },
            Shape::Range => {
                let reconciliation = reconcile(request, state.window);
                match reconciliation {
                    Reconciliation::Covered => {
                        self.stats.record_hit();
                        debug!("Range hit for {} [{}-{}]", key, request.start, request.end);
                        FetchOutcome::Hit(Value::Matrix(extract(
                            &state.payload,
                            request.start,
                            request.end,
                        )))
                    }
                    Reconciliation::Disjoint(range) | Reconciliation::Supersede(range) => {
                        self.stats.record_miss();
                        debug!(
                            "Range miss for {} [{}-{}], cached [{}-{}]",
                            key, request.start, request.end, state.window.start, state.window.end
                        );
                        FetchOutcome::Miss {
                            range,
                            cached: None,
                            cause: None,
                        }
                    }
                    Reconciliation::ExtendLeft(range) | Reconciliation::ExtendRight(range) => {
                        self.stats.record_partial_hit();
                        debug!(
                            "Partial hit for {} [{}-{}], fetch [{}-{}]",
                            key, request.start, request.end, range.start, range.end
                        );
                        FetchOutcome::Miss {
                            range,
                            cached: Some(extract(&state.payload, request.start, request.end)),
                            cause: None,
                        }
                    }
                }
            }
        }
    }

    // ---------------------------------------------------------------
    // Merge
    // ---------------------------------------------------------------

    /// Fold a backing-store answer for `[start, end]` into the entry for `key`.
    ///
    /// Returns the entry's merged payload: a matrix for range entries, the
    /// samples at `end` for instant entries. A result that is neither a
    /// vector nor a matrix is rejected and the entry is left untouched.
    pub fn merge(
        &self,
        key: &str,
        start: i64,
        end: i64,
        step: i64,
        result: QueryResult,
    ) -> Result<Value> {
        let incoming = match result.kind() {
            ValueKind::Vector => Incoming::Vector(result.into_vector()?),
            ValueKind::Matrix => Incoming::Matrix(result.into_matrix()?),
            kind => {
                self.stats.record_malformed_merge();
                warn!("Rejected merge for {}: unsupported value type {}", key, kind);
                return Err(Error::MalformedResult(format!(
                    "cannot cache {} result for {}",
                    kind, key
                )));
            }
        };

        let (entry, _, evicted) = self.store.get_or_create_pending(key);
        if evicted.is_some() {
            self.stats.record_lru_eviction();
        }
        let window = TimeRange::new(start, end);

        let merged = {
            let mut state = entry.write();
            if state.shape == Shape::Pending {
                populate(&mut state, window, step, incoming);
                debug!("Stored first result for {} [{}-{}]", key, start, end);
            } else {
                fold(key, &mut state, window, step, incoming);
            }
            current_value(&state, end)
        };

        if entry.signal().fire() {
            debug!("Load completed for {}", key);
        }
        self.stats.record_merge();
        Ok(merged)
    }

    /// Release a pending entry whose loader could not get data. Waiters wake
    /// and one of them takes over the load.
    pub fn abandon(&self, key: &str) -> bool {
        let entry = match self.store.peek(key) {
            Some(entry) => entry,
            None => return false,
        };
        let removed = {
            let state = entry.write();
            state.shape == Shape::Pending && self.store.remove_if_same(key, &entry)
        };
        if removed {
            entry.signal().fire();
            debug!("Abandoned pending load for {}", key);
        }
        removed
    }

    /// Drop the entry for `key`, waking anyone waiting on it.
    pub fn invalidate(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Some(entry) => {
                entry.signal().fire();
                debug!("Invalidated {}", key);
                true
            }
            None => false,
        }
    }
}

enum Incoming {
    Vector(Vector),
    Matrix(Matrix),
}

/// First write into a pending entry.
fn populate(state: &mut EntryState, window: TimeRange, step: i64, incoming: Incoming) {
    state.window = window;
    state.step = step;
    match incoming {
        Incoming::Vector(v) => {
            state.shape = Shape::Instant;
            state.payload = merge_matrix(Vec::new(), vector_to_matrix(v));
        }
        Incoming::Matrix(m) => {
            state.shape = Shape::Range;
            state.payload = merge_matrix(Vec::new(), m);
        }
    }
}

/// Merge into a ready entry and widen its window.
fn fold(key: &str, state: &mut EntryState, window: TimeRange, step: i64, incoming: Incoming) {
    let cached = std::mem::take(&mut state.payload);
    match incoming {
        Incoming::Vector(v) => {
            state.payload = merge_vector(cached, v);
        }
        Incoming::Matrix(m) => {
            let old = state.window;
            let surrounds = window.start < old.start && window.end > old.end;
            // Windows further apart than one step leave a hole the union
            // would claim to cover.
            let tolerance = state.step.max(step).max(0);
            let gap = window
                .start
                .saturating_sub(old.end)
                .max(old.start.saturating_sub(window.end));
            if surrounds || gap > tolerance {
                // The new window alone is what the entry can vouch for.
                debug!(
                    "Replacing {} [{}-{}] with [{}-{}]",
                    key, old.start, old.end, window.start, window.end
                );
                state.window = window;
                state.step = step;
                state.payload = merge_matrix(Vec::new(), m);
                return;
            }
            state.payload = merge_matrix(cached, m);
        }
    }
    state.window = state.window.union(&window);
    debug!(
        "Merged into {}, window now [{}-{}]",
        key, state.window.start, state.window.end
    );
}

/// Samples an instant entry holds for exactly `t`.
///
/// An entry without series only knows that its one queried instant was
/// empty; any other timestamp was never asked for.
fn instant_lookup(state: &EntryState, t: i64) -> Option<Vector> {
    let at = TimeRange::new(t, t);
    if !state.window.contains(&at) {
        return None;
    }
    if state.payload.is_empty() && state.window != at {
        return None;
    }
    instant_at(&state.payload, t)
}

fn current_value(state: &EntryState, end: i64) -> Value {
    match state.shape {
        Shape::Instant => Value::Vector(
            state
                .payload
                .iter()
                .filter_map(|series| {
                    series
                        .points
                        .binary_search_by_key(&end, |p| p.t)
                        .ok()
                        .map(|at| Sample {
                            metric: series.metric.clone(),
                            point: series.points[at],
                        })
                })
                .collect(),
        ),
        _ => Value::Matrix(state.payload.clone()),
    }
}
