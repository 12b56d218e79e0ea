//! Orchestrator configuration
//!
//! All durations are stored in milliseconds so the struct maps directly
//! onto a TOML file:
//!
//! ```toml
//! task_timeout_ms = 30000
//! reveal_rate_cps = 60
//!
//! [normalizer]
//! floor = 40
//! guard = 120
//! ```

use crate::error::ConfigError;
use forge_content::NormalizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Hard ceiling per task, from activation to terminal state
    pub task_timeout_ms: u64,
    /// Soft wait for the primary generation tier
    pub generation_soft_timeout_ms: u64,
    /// Initial reveal rate in characters per second
    pub reveal_rate_cps: u32,
    /// Reveal scheduler tick
    pub tick_interval_ms: u64,
    /// Poll interval while reveal is paused
    pub pause_poll_interval_ms: u64,
    /// Minimum clean content length; shorter content gets the minimal template
    pub min_content_chars: usize,
    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,
    /// Normalizer over-trimming guard
    pub normalizer: NormalizerConfig,
}

impl OrchestratorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text and validate
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::Invalid("task_timeout_ms must be positive".into()));
        }
        if self.tick_interval_ms == 0 || self.pause_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms and pause_poll_interval_ms must be positive".into(),
            ));
        }
        if self.reveal_rate_cps == 0 {
            return Err(ConfigError::Invalid("reveal_rate_cps must be positive".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".into()));
        }
        if self.normalizer.guard <= self.normalizer.floor {
            return Err(ConfigError::Invalid(format!(
                "normalizer.guard ({}) must exceed normalizer.floor ({})",
                self.normalizer.guard, self.normalizer.floor
            )));
        }
        Ok(())
    }

    /// Hard ceiling per task
    #[inline]
    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Soft wait for the primary tier
    #[inline]
    #[must_use]
    pub fn generation_soft_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_soft_timeout_ms)
    }

    /// Reveal tick
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Paused-state poll interval
    #[inline]
    #[must_use]
    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pause_poll_interval_ms)
    }

    /// With hard ceiling per task
    #[inline]
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_ms = duration_ms(timeout);
        self
    }

    /// With soft wait for the primary tier
    #[inline]
    #[must_use]
    pub fn with_generation_soft_timeout(mut self, timeout: Duration) -> Self {
        self.generation_soft_timeout_ms = duration_ms(timeout);
        self
    }

    /// With initial reveal rate
    #[inline]
    #[must_use]
    pub fn with_reveal_rate(mut self, chars_per_sec: u32) -> Self {
        self.reveal_rate_cps = chars_per_sec;
        self
    }

    /// With reveal tick
    #[inline]
    #[must_use]
    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick_interval_ms = duration_ms(tick);
        self
    }

    /// With minimum clean content length
    #[inline]
    #[must_use]
    pub fn with_min_content_chars(mut self, min: usize) -> Self {
        self.min_content_chars = min;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            task_timeout_ms: 30_000,
            generation_soft_timeout_ms: 20_000,
            reveal_rate_cps: 40,
            tick_interval_ms: 50,
            pause_poll_interval_ms: 250,
            min_content_chars: 80,
            event_capacity: 256,
            normalizer: NormalizerConfig::default(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.task_timeout(), Duration::from_secs(30));
        assert_eq!(config.pause_poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = OrchestratorConfig::from_toml_str(
            "reveal_rate_cps = 80\n\n[normalizer]\nfloor = 10\n",
        )
        .unwrap();
        assert_eq!(config.reveal_rate_cps, 80);
        assert_eq!(config.normalizer.floor, 10);
        assert_eq!(config.normalizer.guard, 120);
        assert_eq!(config.task_timeout_ms, 30_000);
    }

    #[test]
    fn rejects_zero_rate() {
        let err = OrchestratorConfig::from_toml_str("reveal_rate_cps = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_guard_not_above_floor() {
        let err = OrchestratorConfig::from_toml_str("[normalizer]\nfloor = 50\nguard = 50\n")
            .unwrap_err();
        assert!(err.to_string().contains("normalizer.guard"));
    }

    #[test]
    fn rejects_unparseable_toml() {
        let err = OrchestratorConfig::from_toml_str("task_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = OrchestratorConfig::load("/nonexistent/schemaforge.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/schemaforge.toml"));
    }

    #[test]
    fn builders_convert_durations() {
        let config = OrchestratorConfig::new()
            .with_task_timeout(Duration::from_secs(5))
            .with_tick_interval(Duration::from_millis(20))
            .with_reveal_rate(100);
        assert_eq!(config.task_timeout_ms, 5_000);
        assert_eq!(config.tick_interval_ms, 20);
        assert_eq!(config.reveal_rate_cps, 100);
    }
}
