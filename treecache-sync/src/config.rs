//! Cache configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};

/// Default capacity of the delivery channel.
pub const DEFAULT_DELIVERY_CAPACITY: usize = 64;

/// How the cache learns about remote changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBehaviour {
    /// Subscribe to every relevant change and reconcile each delivered bundle.
    Observation,
    /// No subscription; the host invalidates the cache through some other path.
    #[default]
    Invalidate,
}

impl CacheBehaviour {
    /// Returns true if this behaviour needs an event subscription.
    pub fn observes(self) -> bool {
        matches!(self, CacheBehaviour::Observation)
    }
}

/// Configuration for a workspace cache listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name used to tag log output for this cache.
    pub cache_name: String,
    /// Subscription mode.
    pub cache_behaviour: CacheBehaviour,
    /// Bundles that may queue on the delivery channel.
    pub delivery_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: "workspace".to_string(),
            cache_behaviour: CacheBehaviour::default(),
            delivery_capacity: DEFAULT_DELIVERY_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Config for a cache driven by event observation.
    pub fn observation(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            cache_behaviour: CacheBehaviour::Observation,
            ..Default::default()
        }
    }

    /// Parses and validates a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants the rest of the crate relies on.
    pub fn validate(&self) -> SyncResult<()> {
        if self.delivery_capacity == 0 {
            return Err(SyncError::Config(
                "delivery_capacity must be greater than zero".to_string(),
            ));
        }
        if self.cache_name.trim().is_empty() {
            return Err(SyncError::Config("cache_name must not be empty".to_string()));
        }
        Ok(())
    }
}
