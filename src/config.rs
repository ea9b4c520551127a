use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default milliseconds between two re-evaluations of a table.
const DEFAULT_POLL_INTERVAL_MS: u64 = 60_000;

/// Default bound on a single region fetch.
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Tuning knobs for the monitoring core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often each table is re-evaluated.
    pub poll_interval_ms: u64,
    /// Upper bound on one blocking fetch; a source that never returns
    /// must not stall its table's ticker forever.
    pub fetch_timeout_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

impl MonitorConfig {
    /// Defaults with `GRIDWATCH_POLL_MS` / `GRIDWATCH_FETCH_TIMEOUT_MS`
    /// environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = MonitorConfig::default();
        if let Some(ms) = env_ms("GRIDWATCH_POLL_MS") {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = env_ms("GRIDWATCH_FETCH_TIMEOUT_MS") {
            config.fetch_timeout_ms = ms;
        }
        config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn env_ms(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse().ok().filter(|ms| *ms > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_one_minute_polling() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    }

    // Single test so concurrent test threads never race on the env vars.
    #[test]
    fn env_overrides() {
        std::env::set_var("GRIDWATCH_POLL_MS", "250");
        let config = MonitorConfig::from_env();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.fetch_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);

        std::env::set_var("GRIDWATCH_POLL_MS", "not-a-number");
        let config = MonitorConfig::from_env();
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);

        std::env::set_var("GRIDWATCH_POLL_MS", "0");
        let config = MonitorConfig::from_env();
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);

        std::env::remove_var("GRIDWATCH_POLL_MS");
    }
}
