//! Handoff configuration using Figment.
//!
//! Configuration is loaded from:
//! 1. `config/handoff.toml` (base configuration)
//! 2. Environment variables prefixed with `DAQ_HANDOFF_`, nested keys separated
//!    by a double underscore (`DAQ_HANDOFF_RING__CHUNK_SIZE=64`)
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration.
//!
//! # Example
//! ```no_run
//! use daq_handoff::config::HandoffConfig;
//!
//! let config = HandoffConfig::load()?;
//! config.validate()?;
//! println!("ring chunk size: {}", config.ring.chunk_size);
//! # Ok::<(), daq_handoff::error::HandoffError>(())
//! ```

use crate::error::{HandoffError, HandoffResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/handoff.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DAQ_HANDOFF_";

/// Top-level handoff configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Growable ring buffer defaults
    #[serde(default)]
    pub ring: RingConfig,
    /// Buffered handoff queue defaults
    #[serde(default)]
    pub queue: QueueConfig,
    /// Priority channel defaults
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Push-to-pull bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Ring buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Growth granularity in items
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Item bound (0 = unbounded)
    #[serde(default)]
    pub max_size: usize,
}

/// Handoff queue configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Items in flight between producer and consumer
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
}

/// Priority channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Number of priority classes
    #[serde(default = "default_classes")]
    pub classes: usize,
    /// Bound applied to each class
    #[serde(default = "default_per_class_capacity")]
    pub per_class_capacity: usize,
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Capacity of the event queue between producer thread and consumer
    #[serde(default = "default_bridge_capacity")]
    pub queue_capacity: usize,
    /// Name given to the producer thread
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_chunk_size() -> usize {
    256
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_classes() -> usize {
    4
}

fn default_per_class_capacity() -> usize {
    256
}

fn default_bridge_capacity() -> usize {
    512
}

fn default_thread_name() -> String {
    "push-bridge".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_size: 0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            classes: default_classes(),
            per_class_capacity: default_per_class_capacity(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_bridge_capacity(),
            thread_name: default_thread_name(),
        }
    }
}

impl HandoffConfig {
    /// Load configuration from `config/handoff.toml` and environment variables
    pub fn load() -> HandoffResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error: defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> HandoffResult<Self> {
        Ok(Self::figment()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?)
    }

    /// Parse configuration from a TOML string (no environment overrides)
    pub fn from_toml_str(toml: &str) -> HandoffResult<Self> {
        Ok(Self::figment().merge(Toml::string(toml)).extract()?)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> HandoffResult<String> {
        toml::to_string_pretty(self).map_err(|e| HandoffError::ConfigValidation(e.to_string()))
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(HandoffConfig::default()))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> HandoffResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(HandoffError::ConfigValidation(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        if self.ring.chunk_size == 0 {
            return Err(HandoffError::ConfigValidation(
                "ring.chunk_size must be at least 1".into(),
            ));
        }
        if self.ring.max_size != 0 && self.ring.max_size < self.ring.chunk_size {
            return Err(HandoffError::ConfigValidation(format!(
                "ring.max_size {} is below ring.chunk_size {}",
                self.ring.max_size, self.ring.chunk_size
            )));
        }

        if self.queue.capacity == 0 {
            return Err(HandoffError::ConfigValidation(
                "queue.capacity must be at least 1".into(),
            ));
        }

        if self.channel.classes == 0 || self.channel.per_class_capacity == 0 {
            return Err(HandoffError::ConfigValidation(format!(
                "channel needs at least one class of capacity >= 1 (classes = {}, per_class_capacity = {})",
                self.channel.classes, self.channel.per_class_capacity
            )));
        }

        if self.bridge.queue_capacity == 0 {
            return Err(HandoffError::ConfigValidation(
                "bridge.queue_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = HandoffConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring.chunk_size, 256);
        assert_eq!(config.ring.max_size, 0);
        assert_eq!(config.channel.classes, 4);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = HandoffConfig::from_toml_str(
            r#"
            [ring]
            chunk_size = 16

            [channel]
            classes = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.ring.chunk_size, 16);
        assert_eq!(config.ring.max_size, 0);
        assert_eq!(config.channel.classes, 2);
        assert_eq!(config.channel.per_class_capacity, 256);
        assert_eq!(config.queue.capacity, 1024);
    }

    #[test]
    fn invalid_log_level() {
        let mut config = HandoffConfig::default();
        config.logging.level = "verbose".into();
        assert!(matches!(
            config.validate(),
            Err(HandoffError::ConfigValidation(_))
        ));
    }

    #[test]
    fn bound_below_chunk_is_rejected() {
        let mut config = HandoffConfig::default();
        config.ring.chunk_size = 8;
        config.ring.max_size = 4;
        assert!(config.validate().is_err());

        config.ring.max_size = 8;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_capacities_are_rejected() {
        let mut config = HandoffConfig::default();
        config.queue.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = HandoffConfig::default();
        config.channel.classes = 0;
        assert!(config.validate().is_err());

        let mut config = HandoffConfig::default();
        config.bridge.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut config = HandoffConfig::default();
        config.queue.capacity = 7;
        let text = config.to_toml().unwrap();
        let parsed = HandoffConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = HandoffConfig::from_toml_str("[ring\nchunk_size = ").unwrap_err();
        assert!(matches!(err, HandoffError::Config(_)));
    }
}
