//! Entry footprint estimation for the janitor.
//!
//! `LogicalSizeEstimator` counts what the entry logically holds: its scalar
//! fields, label bytes plus one `String` header per label name and value,
//! and per point the record itself plus one pointer of indirection. It
//! ignores allocator slack, spare `Vec` capacity and hash-map overhead, so
//! it undercounts real heap usage, typically by well under 2x for
//! point-heavy entries. Treat thresholds as approximate.

use std::mem::size_of;

use promcache_core::Point;

use crate::entry::{EntryState, Shape};
use crate::reconcile::TimeRange;

/// Estimates how many bytes an entry occupies.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, state: &EntryState) -> u64;
}

/// Default estimator over the entry's logical fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalSizeEstimator;

const SCALAR_BYTES: usize = size_of::<TimeRange>() + size_of::<i64>() + size_of::<Shape>();
const LABEL_OVERHEAD: usize = 2 * size_of::<String>();
const POINT_BYTES: usize = size_of::<Point>() + size_of::<usize>();

impl SizeEstimator for LogicalSizeEstimator {
    fn estimate(&self, state: &EntryState) -> u64 {
        let mut size = SCALAR_BYTES as u64;
        let mut points: u64 = 0;
        for series in &state.payload {
            for label in series.metric.iter() {
                size = size.saturating_add(
                    (label.name.len() + label.value.len() + LABEL_OVERHEAD) as u64,
                );
            }
            points = points.saturating_add(series.points.len() as u64);
        }
        size.saturating_add(points.saturating_mul(POINT_BYTES as u64))
    }
}
