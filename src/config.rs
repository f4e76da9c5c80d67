//! Configuration management for the ODM core
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (odm.toml)
//! - Environment variables (ODM__*)
//!
//! ## Example config file (odm.toml):
//! ```toml
//! [registry]
//! path = "./schemas"
//! strict = true
//!
//! [cascade]
//! hard_cascade = false
//! max_depth = 64
//!
//! [projection]
//! default_depth = 2
//! max_depth = 32
//!
//! [logging]
//! filter = "familiar_odm=info"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cascade::DEFAULT_MAX_DEPTH;
use crate::loader::LoadConfig;
use crate::projection::DEFAULT_MAX_NESTING;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OdmConfig {
    /// Registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Cascade settings
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Projection settings
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where schema definitions live and how strictly they are checked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory (or single file) of schema definitions
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Treat lint errors as load failures
    #[serde(default = "default_true")]
    pub strict: bool,

    /// Skip definition files under these relative prefixes
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
}

/// Cascading delete settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Default for requests that do not say
    #[serde(default)]
    pub hard_cascade: bool,

    /// Maximum ownership levels a single delete may cascade through
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Projection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Uniform depth used when a caller gives none
    #[serde(default = "default_depth")]
    pub default_depth: i64,

    /// Most relation levels a single projection may nest
    #[serde(default = "default_max_nesting")]
    pub max_depth: usize,
}

/// Logging settings (used by the binaries)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_registry_path() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_depth() -> i64 {
    2
}

fn default_max_nesting() -> usize {
    DEFAULT_MAX_NESTING
}

fn default_log_filter() -> String {
    "familiar_odm=info".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            strict: true,
            skip_prefixes: Vec::new(),
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            hard_cascade: false,
            max_depth: default_max_depth(),
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth: default_max_nesting(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl OdmConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["odm.toml", ".odm.toml", "config/odm.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "odm") {
            let xdg_config = config_dir.config_dir().join("odm.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // ODM__CASCADE__MAX_DEPTH=8 and friends
        builder = builder.add_source(
            Environment::with_prefix("ODM")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Registry path, resolved against the working directory
    pub fn registry_path(&self) -> PathBuf {
        if self.registry.path.is_absolute() {
            self.registry.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.registry.path)
        }
    }

    /// Loader settings derived from `[registry]`
    pub fn load_config(&self) -> LoadConfig {
        LoadConfig {
            skip_prefixes: self.registry.skip_prefixes.clone(),
            strict: self.registry.strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OdmConfig::default();
        assert!(config.registry.strict);
        assert!(!config.cascade.hard_cascade);
        assert_eq!(config.cascade.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.projection.default_depth, 2);
        assert_eq!(config.projection.max_depth, DEFAULT_MAX_NESTING);
    }

    #[test]
    fn test_serialize_config() {
        let config = OdmConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[registry]"));
        assert!(toml_str.contains("[cascade]"));
        assert!(toml_str.contains("max_depth = 64"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: OdmConfig = toml::from_str("[cascade]\nmax_depth = 8\n").unwrap();
        assert_eq!(config.cascade.max_depth, 8);
        assert!(!config.cascade.hard_cascade);
        assert_eq!(config.projection.default_depth, 2);
        assert_eq!(config.registry.path, PathBuf::from("schemas"));
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[projection]\ndefault_depth = 3\n").unwrap();

        let config = OdmConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.projection.default_depth, 3);
    }
}
