//! Intake orchestrator configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main orchestrator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Concurrency limits
    pub concurrency: ConcurrencyConfig,

    /// Retry policy
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .closet-intake.yml
        let local_config = PathBuf::from(".closet-intake.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/closet-intake/config.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("closet-intake").join("config.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Maximum tasks in flight at once; 0 means no cap, which is the
    /// observed product behavior (the UI throttles naturally)
    #[serde(rename = "max-concurrent-tasks")]
    pub max_concurrent_tasks: usize,

    /// Graceful shutdown deadline (in seconds)
    #[serde(rename = "shutdown-timeout-secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 0,
            shutdown_timeout_secs: 30,
        }
    }
}

/// Retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts per task; 0 means unlimited, leaving any
    /// throttling to the calling layer
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_uncapped() {
        let config = Config::default();
        assert_eq!(config.concurrency.max_concurrent_tasks, 0);
        assert_eq!(config.retry.max_attempts, 0);
        assert_eq!(config.concurrency.shutdown_timeout_secs, 30);
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "concurrency:\n  max-concurrent-tasks: 4\n  shutdown-timeout-secs: 10\nretry:\n  max-attempts: 3"
        )
        .unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.concurrency.max_concurrent_tasks, 4);
        assert_eq!(config.concurrency.shutdown_timeout_secs, 10);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retry:\n  max-attempts: 1").unwrap();

        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.concurrency.max_concurrent_tasks, 0);
    }

    #[test]
    fn test_load_missing_explicit_path_errors() {
        let result = Config::load(Some(&PathBuf::from("/nonexistent/config.yml")));
        assert!(result.is_err());
    }
}
