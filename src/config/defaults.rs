//! Default configuration values for vadscope

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub walker: WalkerDefaults,
    pub dump: DumpDefaults,
    pub logging: LoggingDefaults,
}

/// Default tree walker limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerDefaults {
    pub max_nodes: usize,
    pub max_depth: usize,
}

/// Default dump settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpDefaults {
    pub max_region_size: u64,
    pub threads: usize,
    pub verbose: bool,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        walker: WalkerDefaults {
            max_nodes: 65536,
            // A balanced tree of max_nodes entries is far shallower than this
            max_depth: 128,
        },
        dump: DumpDefaults {
            max_region_size: 0x1_0000_0000, // 4GB
            threads: num_cpus::get().min(8),
            verbose: false,
        },
        logging: LoggingDefaults {
            level: "warn".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walker_defaults() {
        let config = default_config();
        assert_eq!(config.walker.max_nodes, 65536);
        assert_eq!(config.walker.max_depth, 128);
    }

    #[test]
    fn test_dump_defaults() {
        let config = default_config();
        assert_eq!(config.dump.max_region_size, 4 * 1024 * 1024 * 1024);
        assert!(config.dump.threads > 0);
        assert!(config.dump.threads <= 8);
        assert!(!config.dump.verbose);
    }

    #[test]
    fn test_logging_defaults() {
        let config = default_config();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_serialization() {
        let config = default_config();
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("max_nodes"));
        assert!(serialized.contains("max_region_size"));

        let deserialized: ConfigDefaults = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.walker.max_depth, config.walker.max_depth);
        assert_eq!(deserialized.dump.threads, config.dump.threads);
    }
}
