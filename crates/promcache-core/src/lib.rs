//! Promcache Core: query value model, errors, configuration, key fingerprints.

pub mod config;
pub mod error;
pub mod key;
pub mod types;

pub use config::CacheConfig;
pub use error::{Error, Result};
pub use key::fingerprint;
pub use types::{
    vector_to_matrix, Label, Labels, Matrix, Point, QueryResult, Sample, Series, Value, ValueKind,
    Vector,
};
