//! Configuration loader for vadscope
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::vad::walker::WalkLimits;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "vadscope.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_walker")]
    pub walker: WalkerConfig,

    #[serde(default = "default_dump")]
    pub dump: DumpConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Tree walker guards against corrupt or cyclic trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Region dump configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Destination directory; must exist before a dump starts
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_max_region_size")]
    pub max_region_size: u64,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl WalkerConfig {
    /// Walk limits derived from this configuration
    pub fn limits(&self) -> WalkLimits {
        WalkLimits {
            max_nodes: self.max_nodes,
            max_depth: self.max_depth,
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file does
    /// not exist. A file that exists but fails to parse is still an error.
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    ConfigLoader::new(DEFAULT_CONFIG_FILE).load_or_default()
}

// Default functions for serde
fn default_walker() -> WalkerConfig {
    let defaults = default_config();
    WalkerConfig {
        max_nodes: defaults.walker.max_nodes,
        max_depth: defaults.walker.max_depth,
    }
}

fn default_dump() -> DumpConfig {
    let defaults = default_config();
    DumpConfig {
        directory: None,
        max_region_size: defaults.dump.max_region_size,
        threads: defaults.dump.threads,
        verbose: defaults.dump.verbose,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_max_nodes() -> usize {
    default_config().walker.max_nodes
}

fn default_max_depth() -> usize {
    default_config().walker.max_depth
}

fn default_max_region_size() -> u64 {
    default_config().dump.max_region_size
}

fn default_threads() -> usize {
    default_config().dump.threads
}

fn default_verbose() -> bool {
    default_config().dump.verbose
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for DumpConfig {
    fn default() -> Self {
        default_dump()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            walker: default_walker(),
            dump: default_dump(),
            logging: default_logging(),
        }
    }
}
