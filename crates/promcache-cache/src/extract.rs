//! Read paths over cached payloads: sub-range slices and exact instants.

use promcache_core::{Matrix, Sample, Series, Vector};

/// Slice every series to the points with `start <= t <= end`.
///
/// A series with no points in range stays in the output with an empty
/// point list.
pub fn extract(matrix: &Matrix, start: i64, end: i64) -> Matrix {
    matrix
        .iter()
        .map(|series| {
            let begin = series.points.partition_point(|p| p.t < start);
            let stop = series.points.partition_point(|p| p.t <= end).max(begin);
            Series::new(series.metric.clone(), series.points[begin..stop].to_vec())
        })
        .collect()
}

/// Look up every series' point at exactly `t`.
///
/// All-or-nothing: `None` as soon as one series has no point at `t`, since a
/// vector missing some label sets would be silently wrong.
pub fn instant_at(matrix: &Matrix, t: i64) -> Option<Vector> {
    let mut vector = Vec::with_capacity(matrix.len());
    for series in matrix {
        let at = series.points.binary_search_by_key(&t, |p| p.t).ok()?;
        vector.push(Sample {
            metric: series.metric.clone(),
            point: series.points[at],
        });
    }
    Some(vector)
}
