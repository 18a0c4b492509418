//! Engine-wide defaults for node run settings.

use std::time::Duration;

use crate::models::NodeSettings;

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-attempt timeout when a node sets none.
    pub default_timeout: Duration,
    /// Retries after the first failed attempt when a node sets none.
    pub default_retry_count: u32,
    /// Fixed wait between attempts when a node sets none.
    pub default_retry_delay: Duration,
    /// Whether exhausted failures are absorbed when a node does not say.
    pub default_continue_on_fail: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            default_retry_count: 0,
            default_retry_delay: Duration::ZERO,
            default_continue_on_fail: false,
        }
    }
}

/// Settings in effect for one node invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub timeout: Duration,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub continue_on_fail: bool,
}

impl EffectiveSettings {
    /// Total number of attempts, the first one included.
    pub fn attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

impl EngineConfig {
    /// Fill the unset fields of `settings` from the defaults.
    pub fn resolve(&self, settings: &NodeSettings) -> EffectiveSettings {
        EffectiveSettings {
            timeout: settings
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_timeout),
            retry_count: settings.retry_count.unwrap_or(self.default_retry_count),
            retry_delay: settings
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(self.default_retry_delay),
            continue_on_fail: settings
                .continue_on_fail
                .unwrap_or(self.default_continue_on_fail),
        }
    }
}
