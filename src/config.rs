//! Engine configuration.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_micros(1000);
pub const DEFAULT_MAX_SIZE: usize = 100;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(50);
pub const DEFAULT_SHRINK_THRESHOLD: usize = 1024;

/// Flush policy knobs.
///
/// - `ttl`: how long pending listeners may wait before a time-triggered flush
/// - `max_size`: a flush fires once the active-listener count exceeds this
/// - `poll_interval`: sleep between control-loop ticks
/// - `shrink_threshold`: table capacity above which an emptied table is shrunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub ttl: Duration,
    pub max_size: usize,
    pub poll_interval: Duration,
    pub shrink_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_size: DEFAULT_MAX_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shrink_threshold: DEFAULT_SHRINK_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by environment:
    /// - `AUTOPIPELINE_TTL_US`
    /// - `AUTOPIPELINE_MAX_SIZE`
    /// - `AUTOPIPELINE_POLL_INTERVAL_US`
    ///
    /// Values that fail to parse are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(us) = env_parse::<u64>("AUTOPIPELINE_TTL_US") {
            cfg.ttl = Duration::from_micros(us);
        }
        if let Some(n) = env_parse::<usize>("AUTOPIPELINE_MAX_SIZE") {
            cfg.max_size = n;
        }
        if let Some(us) = env_parse::<u64>("AUTOPIPELINE_POLL_INTERVAL_US") {
            cfg.poll_interval = Duration::from_micros(us);
        }
        cfg
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_shrink_threshold(mut self, n: usize) -> Self {
        self.shrink_threshold = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::configuration_with_context(
                "poll interval must be positive",
                ErrorContext::new()
                    .with_field_path("config.poll_interval")
                    .with_source("config"),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.trim().parse::<T>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.ttl, Duration::from_millis(1));
        assert_eq!(cfg.max_size, 100);
        assert_eq!(cfg.poll_interval, Duration::from_micros(50));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let cfg = PipelineConfig::new()
            .with_ttl(Duration::from_micros(500))
            .with_max_size(1)
            .with_poll_interval(Duration::from_micros(10))
            .with_shrink_threshold(8);
        assert_eq!(cfg.ttl, Duration::from_micros(500));
        assert_eq!(cfg.max_size, 1);
        assert_eq!(cfg.poll_interval, Duration::from_micros(10));
        assert_eq!(cfg.shrink_threshold, 8);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let err = PipelineConfig::new()
            .with_poll_interval(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_from_env_overrides_and_ignores_garbage() {
        std::env::set_var("AUTOPIPELINE_TTL_US", "250");
        std::env::set_var("AUTOPIPELINE_MAX_SIZE", "not-a-number");
        std::env::set_var("AUTOPIPELINE_POLL_INTERVAL_US", " 20 ");
        let cfg = PipelineConfig::from_env();
        std::env::remove_var("AUTOPIPELINE_TTL_US");
        std::env::remove_var("AUTOPIPELINE_MAX_SIZE");
        std::env::remove_var("AUTOPIPELINE_POLL_INTERVAL_US");

        assert_eq!(cfg.ttl, Duration::from_micros(250));
        assert_eq!(cfg.max_size, DEFAULT_MAX_SIZE);
        assert_eq!(cfg.poll_interval, Duration::from_micros(20));
    }

    #[test]
    fn test_serde_roundtrip_preserves_values() {
        let cfg = PipelineConfig::new().with_max_size(7);
        let json = serde_json::to_string(&cfg).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
