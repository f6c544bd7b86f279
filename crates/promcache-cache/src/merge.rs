//! Folding freshly queried series into cached ones.
//!
//! Series are matched by identical label set. Points stay strictly
//! increasing by timestamp: where the cached and incoming spans overlap the
//! cached points are kept and only the incoming points outside the cached
//! span are added.

use std::collections::HashMap;

use promcache_core::{Labels, Matrix, Point, Series, Vector};

/// How an incoming span sits relative to the cached span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// Incoming starts after the cached end.
    Append,
    /// Incoming ends before the cached start.
    Prepend,
    /// Cached end falls inside the incoming span.
    Tail,
    /// Cached start falls inside the incoming span.
    Head,
    /// Incoming spans past the cached span on both sides.
    Surround,
    /// Incoming lies within the cached span.
    Within,
}

/// Classify spans given as `(first_t, last_t)`.
pub fn classify(cached: (i64, i64), incoming: (i64, i64)) -> Overlap {
    let (c_first, c_last) = cached;
    let (n_first, n_last) = incoming;
    if n_first > c_last {
        Overlap::Append
    } else if n_last < c_first {
        Overlap::Prepend
    } else if n_first < c_first && n_last > c_last {
        Overlap::Surround
    } else if c_last >= n_first && c_last < n_last {
        Overlap::Tail
    } else if c_first > n_first && c_first <= n_last {
        Overlap::Head
    } else {
        Overlap::Within
    }
}

/// Merge two point sequences of the same series.
pub fn merge_points(cached: Vec<Point>, mut incoming: Vec<Point>) -> Vec<Point> {
    normalize(&mut incoming);
    let (c_first, c_last) = match (cached.first(), cached.last()) {
        (Some(f), Some(l)) => (f.t, l.t),
        _ => return incoming,
    };
    let (n_first, n_last) = match (incoming.first(), incoming.last()) {
        (Some(f), Some(l)) => (f.t, l.t),
        _ => return cached,
    };

    // First incoming index at or after the cached start, and first strictly
    // after the cached end.
    let head_cut = incoming.partition_point(|p| p.t < c_first);
    let tail_cut = incoming.partition_point(|p| p.t <= c_last);

    let mut merged = match classify((c_first, c_last), (n_first, n_last)) {
        Overlap::Append => {
            let mut out = cached;
            out.extend(incoming);
            out
        }
        Overlap::Prepend => {
            incoming.extend(cached);
            incoming
        }
        Overlap::Tail => {
            let mut out = cached;
            out.extend_from_slice(&incoming[tail_cut..]);
            out
        }
        Overlap::Head => {
            incoming.truncate(head_cut);
            incoming.extend(cached);
            incoming
        }
        Overlap::Surround => {
            let mut out = Vec::with_capacity(head_cut + cached.len() + incoming.len() - tail_cut);
            out.extend_from_slice(&incoming[..head_cut]);
            out.extend(cached);
            out.extend_from_slice(&incoming[tail_cut..]);
            out
        }
        Overlap::Within => cached,
    };

    // The cuts already yield sorted output; this keeps the invariant even if
    // the cached side was handed in out of order.
    normalize(&mut merged);
    merged
}

/// Merge a range result into cached series. Series found on only one side
/// pass through; incoming-only series follow the cached ones in arrival order.
pub fn merge_matrix(cached: Matrix, incoming: Matrix) -> Matrix {
    let mut pending: Vec<Option<Series>> = Vec::with_capacity(incoming.len());
    let mut index: HashMap<Labels, usize> = HashMap::with_capacity(incoming.len());
    for series in incoming {
        match index.get(&series.metric).copied() {
            // Duplicate label set in one result: fold it into the first.
            Some(i) => {
                if let Some(existing) = pending[i].as_mut() {
                    let points = std::mem::take(&mut existing.points);
                    existing.points = merge_points(points, series.points);
                }
            }
            None => {
                index.insert(series.metric.clone(), pending.len());
                pending.push(Some(series));
            }
        }
    }

    let mut output = Vec::with_capacity(cached.len() + pending.len());
    for mut series in cached {
        if let Some(incoming) = index.get(&series.metric).and_then(|&i| pending[i].take()) {
            series.points = merge_points(series.points, incoming.points);
        }
        output.push(series);
    }
    output.extend(pending.into_iter().flatten().map(|mut s| {
        normalize(&mut s.points);
        s
    }));
    output
}

/// Insert instant samples into cached series.
///
/// Each sample lands at its binary-searched position. A sample at a
/// timestamp already present overwrites the stored value, so re-merging the
/// same vector is a no-op. Samples for unknown label sets start new
/// one-point series. Every series is returned, updated or not.
pub fn merge_vector(cached: Matrix, incoming: Vector) -> Matrix {
    let mut output = cached;
    let mut index: HashMap<Labels, usize> = output
        .iter()
        .enumerate()
        .map(|(i, s)| (s.metric.clone(), i))
        .collect();

    for sample in incoming {
        match index.get(&sample.metric).copied() {
            Some(i) => insert_point(&mut output[i].points, sample.point),
            None => {
                index.insert(sample.metric.clone(), output.len());
                output.push(Series::new(sample.metric, vec![sample.point]));
            }
        }
    }
    output
}

fn insert_point(points: &mut Vec<Point>, point: Point) {
    let at = points.partition_point(|p| p.t < point.t);
    match points.get_mut(at) {
        Some(existing) if existing.t == point.t => existing.v = point.v,
        _ => points.insert(at, point),
    }
}

/// Sort by timestamp and drop repeated timestamps, keeping the first.
fn normalize(points: &mut Vec<Point>) {
    if points.windows(2).all(|w| w[0].t < w[1].t) {
        return;
    }
    points.sort_by_key(|p| p.t);
    points.dedup_by_key(|p| p.t);
}
