//! Shared helpers for the cache integration tests.

#![allow(dead_code)]

use std::sync::Once;

use promcache_core::{Labels, Point, Sample, Series};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Route cache logs to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Series `{m="<name>"}` with a point every `step` from `from` to `to` inclusive.
pub fn range_series(name: &str, from: i64, to: i64, step: i64) -> Series {
    Series::new(
        Labels::from_pairs(&[("m", name)]),
        (from..=to)
            .step_by(step as usize)
            .map(|t| Point::new(t, t as f64))
            .collect(),
    )
}

pub fn sample(name: &str, t: i64, v: f64) -> Sample {
    Sample {
        metric: Labels::from_pairs(&[("m", name)]),
        point: Point::new(t, v),
    }
}

pub fn times(series: &Series) -> Vec<i64> {
    series.points.iter().map(|p| p.t).collect()
}
