//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Knobs controlling one [`Scheduler`](crate::Scheduler).
///
/// Every field has a default, so a partial TOML `[scheduler]` table
/// deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Schedule each unconnected cluster independently instead of failing.
    pub allow_disconnected: bool,
    /// Fix channel capacities to the high-water marks seen while building.
    pub constrain_buffer_sizes: bool,
    /// Accept ports whose rate may change at runtime.
    pub allow_rate_changes: bool,
    /// `None` disables caching, `Some(0)` caches without eviction, `Some(n)`
    /// keeps the `n` most recently used schedules.
    pub cache_capacity: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            allow_disconnected: false,
            constrain_buffer_sizes: false,
            allow_rate_changes: false,
            cache_capacity: Some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert!(!config.allow_disconnected);
        assert!(!config.constrain_buffer_sizes);
        assert_eq!(config.cache_capacity, Some(0));
    }
}
