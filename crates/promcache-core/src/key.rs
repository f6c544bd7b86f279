//! Cache key fingerprints.

use sha2::{Digest, Sha256};

/// Fingerprint a query and its step into an opaque cache key.
///
/// Whitespace runs in the query are collapsed so trivially reformatted
/// queries share an entry.
pub fn fingerprint(query: &str, step: i64) -> String {
    let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"\0");
    hasher.update(step.to_le_bytes());
    hex::encode(hasher.finalize())
}
