//! Cache configuration: JSON file, environment overrides, validation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_MAX_ENTRIES: usize = 1024;
pub const DEFAULT_MAX_ITEM_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_PENDING_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PENDING_TTL_SECS: u64 = 300;

/// Result cache settings. Values only; nothing here changes behavior shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// LRU capacity in entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Entries whose estimated size exceeds this are removed by the janitor.
    #[serde(default = "default_max_item_bytes")]
    pub max_item_bytes: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How long a fetch waits on another caller's in-flight load.
    #[serde(default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,
    /// Pending entries older than this are discarded by the janitor.
    #[serde(default = "default_pending_ttl_secs")]
    pub pending_ttl_secs: u64,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}
fn default_max_item_bytes() -> u64 {
    DEFAULT_MAX_ITEM_BYTES
}
fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_pending_timeout_secs() -> u64 {
    DEFAULT_PENDING_TIMEOUT_SECS
}
fn default_pending_ttl_secs() -> u64 {
    DEFAULT_PENDING_TTL_SECS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_item_bytes: DEFAULT_MAX_ITEM_BYTES,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            pending_timeout_secs: DEFAULT_PENDING_TIMEOUT_SECS,
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
        }
    }
}

impl CacheConfig {
    /// Load config from a JSON file, falling back to defaults, then apply
    /// environment overrides.
    pub fn load(config_path: &Path) -> Self {
        let mut config: CacheConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(
                    "Ignoring unparsable cache config {}: {}",
                    config_path.display(),
                    e
                );
                CacheConfig::default()
            }),
            Err(_) => CacheConfig::default(),
        };
        config.apply_env();
        config
    }

    /// Override fields from `PROMCACHE_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_parse("PROMCACHE_MAX_ENTRIES") {
            self.max_entries = v;
        }
        if let Some(v) = env_parse("PROMCACHE_MAX_ITEM_BYTES") {
            self.max_item_bytes = v;
        }
        if let Some(v) = env_parse("PROMCACHE_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = v;
        }
        if let Some(v) = env_parse("PROMCACHE_PENDING_TIMEOUT_SECS") {
            self.pending_timeout_secs = v;
        }
        if let Some(v) = env_parse("PROMCACHE_PENDING_TTL_SECS") {
            self.pending_ttl_secs = v;
        }
    }

    /// Reject values the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::Config("max_entries must be greater than 0".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(Error::Config(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Save config to disk as pretty JSON.
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, json)?;
        info!("Saved cache config to {}", config_path.display());
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}={}", name, raw);
            None
        }
    }
}
