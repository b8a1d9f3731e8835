//! Configuration system
//!
//! `PoolConfig` carries the construction parameters of a
//! [`BatchedInstancePool`](crate::pool::BatchedInstancePool). It can be
//! built in code or loaded from TOML/RON files through the [`Config`] trait.

pub use serde::{Serialize, Deserialize};

use crate::foundation::math::{DEFAULT_PARK_DISTANCE, FAR_DISTANCE_THRESHOLD};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but are not usable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Construction parameters for a batched instance pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Slots per batch. Fixed for the lifetime of the logical index mapping.
    pub batch_size: usize,
    /// Logical capacity; determines how many batches are allocated
    pub max_instances: usize,
    /// Allocate per-instance color buffers
    pub enable_colors: bool,
    /// Recompute bounding volumes on flush (needed for culling/hit-testing)
    pub enable_bounds: bool,
    /// Per-axis distance at which inactive slots are parked
    pub park_distance: f32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            max_instances: 1024,
            enable_colors: false,
            enable_bounds: false,
            park_distance: DEFAULT_PARK_DISTANCE,
        }
    }
}

impl Config for PoolConfig {}

impl PoolConfig {
    /// Create a configuration with the given sizing and default features
    pub fn new(batch_size: usize, max_instances: usize) -> Self {
        Self {
            batch_size,
            max_instances,
            ..Default::default()
        }
    }

    /// Enable or disable per-instance colors
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.enable_colors = enabled;
        self
    }

    /// Enable or disable bounding-volume maintenance
    pub fn with_bounds(mut self, enabled: bool) -> Self {
        self.enable_bounds = enabled;
        self
    }

    /// Override the parking distance
    pub fn with_park_distance(mut self, distance: f32) -> Self {
        self.park_distance = distance;
        self
    }

    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from RON text and validate it
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration describes a usable pool
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be greater than zero".to_string()));
        }
        if !self.park_distance.is_finite() || self.park_distance < FAR_DISTANCE_THRESHOLD {
            return Err(ConfigError::Invalid(format!(
                "park_distance {} is inside the working volume (minimum {})",
                self.park_distance, FAR_DISTANCE_THRESHOLD
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.enable_colors);
        assert!(!config.enable_bounds);
    }

    #[test]
    fn test_toml_partial_uses_defaults() {
        let config = PoolConfig::from_toml_str("batch_size = 4\nmax_instances = 10\nenable_colors = true\n").unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.max_instances, 10);
        assert!(config.enable_colors);
        assert!(!config.enable_bounds);
        assert_eq!(config.park_distance, DEFAULT_PARK_DISTANCE);
    }

    #[test]
    fn test_ron_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("instance_pool_config_{}.ron", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let config = PoolConfig::new(64, 500).with_bounds(true);

        config.save_to_file(&path).unwrap();
        let loaded = PoolConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        let err = PoolConfig::from_ron_str("(batch_size: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_near_park_distance() {
        let config = PoolConfig::default().with_park_distance(50.0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = PoolConfig::default().save_to_file("pool.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));

        let path = std::env::temp_dir().join(format!("instance_pool_config_{}.yaml", std::process::id()));
        let path = path.to_string_lossy().to_string();
        std::fs::write(&path, "batch_size: 8\n").unwrap();
        let err = PoolConfig::load_from_file(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);

        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
