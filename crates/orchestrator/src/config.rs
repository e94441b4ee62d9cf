use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the step framework and the process runner.
///
/// Durations are kept as plain integers so the struct maps directly onto a
/// TOML table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Timeout applied by steps that have no operator-supplied one.
    pub default_step_timeout_secs: u64,
    /// Upper bound of concurrent platform reads within a single tick.
    pub polling_concurrency: usize,
    /// Delay between two ticks of a step in POLL phase.
    pub poll_interval_ms: u64,
    /// How often a step may answer RETRY before the process fails.
    pub max_retries: u32,
    /// Lifetime of cached platform lookups.
    pub cache_ttl_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_step_timeout_secs: 60 * 60,
            polling_concurrency: 8,
            poll_interval_ms: 5_000,
            max_retries: 3,
            cache_ttl_secs: 10 * 60,
        }
    }
}

impl OrchestratorConfig {
    pub fn default_step_timeout(&self) -> Duration {
        Duration::from_secs(self.default_step_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn with_default_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_polling_concurrency(mut self, concurrency: usize) -> Self {
        self.polling_concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.default_step_timeout(), Duration::from_secs(3600));
        assert_eq!(config.polling_concurrency, 8);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_builders() {
        let config = OrchestratorConfig::default()
            .with_polling_concurrency(0)
            .with_poll_interval(Duration::from_millis(250))
            .with_max_retries(1);

        assert_eq!(config.polling_concurrency, 1);
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.default_step_timeout_secs, 3600);
    }
}
