//! Promcache Cache: result cache for a PromQL query layer.
//!
//! Caches query results by fingerprint and serves exact hits, sub-ranges
//! and extensions from memory. `Cacher::fetch` tells the caller what, if
//! anything, still has to come from the backing store; `Cacher::merge`
//! folds that answer back in. Concurrent fetches of an unseen key are
//! coalesced behind a single loader. A background janitor bounds the size
//! of individual entries while the LRU store bounds their number.

pub mod cacher;
pub mod entry;
pub mod extract;
pub mod janitor;
pub mod merge;
pub mod reconcile;
pub mod size;
pub mod stats;
pub mod store;

pub use cacher::{Cacher, FetchOutcome};
pub use entry::{EntryState, Shape};
pub use janitor::{spawn_janitor, JanitorHandle, SweepReport};
pub use reconcile::{reconcile, Reconciliation, TimeRange};
pub use size::{LogicalSizeEstimator, SizeEstimator};
pub use stats::CacheStatsSnapshot;
