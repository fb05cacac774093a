//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Transport settings.
    pub server: ServerSection,
    /// Canonical-state retention settings.
    pub state: StateSection,
    /// Operation log bounds.
    pub oplog: OplogSection,
    /// Reconnect snapshot compression.
    pub compression: CompressionSection,
    /// Field resolver graph settings.
    pub resolver: ResolverSection,
    /// Debug/development settings.
    pub debug: DebugSection,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind.
    pub bind_address: String,
    /// Port to bind.
    pub port: u16,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Maximum inbound frame size in bytes.
    pub max_frame_size: u32,
}

/// What happens to canonical state when the last subscriber leaves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Keep as warm cache indefinitely (default).
    Retain,
    /// Drop immediately.
    Evict,
    /// Drop after `retention_ttl_secs`.
    Ttl,
}

/// Canonical-state retention configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateSection {
    /// Retention policy for unsubscribed entities.
    pub retention: RetentionMode,
    /// TTL in seconds, used only with [`RetentionMode::Ttl`].
    pub retention_ttl_secs: u64,
}

/// Operation log bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OplogSection {
    /// Maximum retained entries across all entities.
    pub max_entries: usize,
    /// Maximum total patch bytes across all entities.
    pub max_bytes: usize,
    /// Maximum entry age in seconds.
    pub max_age_secs: u64,
}

/// Reconnect snapshot compression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompressionSection {
    /// Whether compression is enabled at all.
    pub enabled: bool,
    /// Minimum serialized size (bytes) before compression applies.
    pub threshold: usize,
}

/// Field resolver graph settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverSection {
    /// Permit overlap-scoring type discovery for untagged objects.
    pub allow_shape_inference: bool,
    /// Maximum resolution rounds per operation.
    pub max_depth: usize,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugSection {
    /// Log level override (e.g. "debug", "info,lens_state=trace").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 7810,
            max_connections: 256,
            max_frame_size: 1_048_576,
        }
    }
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            retention: RetentionMode::Retain,
            retention_ttl_secs: 300,
        }
    }
}

impl Default for OplogSection {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_bytes: 4 * 1024 * 1024,
            max_age_secs: 300,
        }
    }
}

impl Default for CompressionSection {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1024,
        }
    }
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            allow_shape_inference: false,
            max_depth: 16,
        }
    }
}

impl Default for DebugSection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// The default config directory (`<platform config dir>/lens`).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lens")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
