//! Configuration settings and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::indexer::{CoordinatorConfig, DEFAULT_HASH_RATE, DEFAULT_STAT_RATE};
use crate::watcher::WatcherConfig;
use crate::{Error, Result};

/// Upper bound on indexing worker threads.
const MAX_WORKERS: usize = 64;

/// Main configuration for the fsindex runner.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directories to watch and index.
    pub watch_dirs: Vec<PathBuf>,

    /// Number of indexing worker threads.
    pub workers: usize,

    /// Capacity of the bounded work queue.
    pub queue_len: usize,

    /// Quiet period after the last write before a file is considered settled.
    pub write_timeout: Duration,

    /// Stat calls per second across all workers. 0 disables pacing.
    pub stat_rate: u32,

    /// File hashes per second across all workers. 0 disables pacing.
    pub hash_rate: u32,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let coordinator = CoordinatorConfig::default();
        Self {
            watch_dirs: Vec::new(),
            workers: coordinator.workers,
            queue_len: coordinator.queue_len,
            write_timeout: WatcherConfig::default().write_timeout,
            stat_rate: DEFAULT_STAT_RATE,
            hash_rate: DEFAULT_HASH_RATE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.workers == 0 {
            return Err(Error::config("workers cannot be 0"));
        }

        if self.workers > MAX_WORKERS {
            return Err(Error::config(format!(
                "workers cannot exceed {MAX_WORKERS}"
            )));
        }

        if self.queue_len == 0 {
            return Err(Error::config("queue_len cannot be 0"));
        }

        if self.write_timeout.is_zero() {
            return Err(Error::config("write_timeout cannot be 0"));
        }

        for dir in &self.watch_dirs {
            if !dir.is_absolute() {
                return Err(Error::config(format!(
                    "watch directory '{}' must be absolute",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Watcher settings derived from this configuration.
    #[must_use]
    pub const fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            write_timeout: self.write_timeout,
        }
    }

    /// Coordinator settings derived from this configuration.
    #[must_use]
    pub const fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            workers: self.workers,
            queue_len: self.queue_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.watch_dirs.is_empty());
        assert_eq!(config.write_timeout, Duration::from_secs(3));
        assert!(config.workers >= 1);
        assert_eq!(config.stat_rate, 200);
        assert_eq!(config.hash_rate, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_new() {
        let config = Config::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "invalid".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_zero_workers() {
        let config = Config {
            workers: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_validate_too_many_workers() {
        let config = Config {
            workers: 100,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_validate_zero_queue() {
        let config = Config {
            queue_len: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue_len"));
    }

    #[test]
    fn test_validate_zero_write_timeout() {
        let config = Config {
            write_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("write_timeout"));
    }

    #[test]
    fn test_validate_relative_watch_dir() {
        let config = Config {
            watch_dirs: vec![PathBuf::from("relative/dir")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_component_configs() {
        let config = Config {
            workers: 3,
            queue_len: 17,
            write_timeout: Duration::from_millis(250),
            ..Default::default()
        };
        assert_eq!(config.watcher_config().write_timeout, Duration::from_millis(250));
        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.workers, 3);
        assert_eq!(coordinator.queue_len, 17);
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }
}
