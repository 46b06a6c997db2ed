//! Configuration validator for vadscope
//!
//! Validates configuration values before any traversal begins. A failure here
//! is the only condition that halts a whole run.

use super::loader::{Config, ConfigError, DumpConfig, LoggingConfig, WalkerConfig};
use std::path::{Path, PathBuf};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_walker(&config.walker)?;
        Self::validate_dump(&config.dump)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates walker limits
    fn validate_walker(walker: &WalkerConfig) -> Result<(), ConfigError> {
        if walker.max_nodes == 0 {
            return Err(ConfigError::Invalid(
                "Walker max_nodes must be at least 1".to_string(),
            ));
        }

        if walker.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "Walker max_depth must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates dump settings that do not touch the filesystem
    fn validate_dump(dump: &DumpConfig) -> Result<(), ConfigError> {
        if dump.threads == 0 {
            return Err(ConfigError::Invalid(
                "Dump threads must be at least 1".to_string(),
            ));
        }

        if dump.threads > 128 {
            return Err(ConfigError::Invalid(
                "Dump threads cannot exceed 128".to_string(),
            ));
        }

        if dump.max_region_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum region size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }

    /// Checks that a dump destination is an existing directory and returns it
    pub fn validate_dump_directory(directory: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let directory = directory
            .ok_or_else(|| ConfigError::Invalid("Dump directory not specified".to_string()))?;

        if !directory.exists() {
            return Err(ConfigError::Invalid(format!(
                "Dump directory {} does not exist",
                directory.display()
            )));
        }

        if !directory.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "{} is not a directory",
                directory.display()
            )));
        }

        Ok(directory.to_path_buf())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
