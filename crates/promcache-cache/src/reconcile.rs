//! Time-range reconciliation between a request and a cached window.
//!
//! Decides whether the cached window covers a request and, if not, which
//! range the caller still has to query from the backing store.

use serde::Serialize;

/// Inclusive `[start, end]` window in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest window covering both.
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Outcome of comparing a requested window with the cached one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The cached window covers the request; nothing to fetch.
    Covered,
    /// No overlap at all; fetch the whole request.
    Disjoint(TimeRange),
    /// The request is wider on both sides; fetch the whole request and
    /// replace the entry with it.
    Supersede(TimeRange),
    /// Missing data before the cached start: `[request.start, cache.start]`.
    ExtendLeft(TimeRange),
    /// Missing data after the cached end: `[cache.end, request.end]`.
    ExtendRight(TimeRange),
}

impl Reconciliation {
    /// Range the caller must query, `None` when covered.
    pub fn fetch_range(&self) -> Option<TimeRange> {
        match *self {
            Self::Covered => None,
            Self::Disjoint(r) | Self::Supersede(r) | Self::ExtendLeft(r) | Self::ExtendRight(r) => {
                Some(r)
            }
        }
    }
}

/// Compare `request` against `cached`. Rules apply in order.
///
/// Extension ranges share their inner bound with the cached window. The
/// boundary point comes back from the store twice and the merger drops the
/// duplicate.
pub fn reconcile(request: TimeRange, cached: TimeRange) -> Reconciliation {
    if request.end < cached.start || request.start > cached.end {
        return Reconciliation::Disjoint(request);
    }
    if request.start < cached.start && request.end > cached.end {
        return Reconciliation::Supersede(request);
    }
    if request.start < cached.start {
        return Reconciliation::ExtendLeft(TimeRange::new(request.start, cached.start));
    }
    if request.end > cached.end {
        return Reconciliation::ExtendRight(TimeRange::new(cached.end, request.end));
    }
    Reconciliation::Covered
}
