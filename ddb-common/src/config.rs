//! Configuration loading and database path resolution
//!
//! Database path priority order:
//! 1. Command-line argument (highest priority)
//! 2. `DISCOURSEDB_DATABASE` environment variable
//! 3. `[database] path` in the TOML config file
//! 4. OS-dependent default under the user data directory

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the database file location
pub const DATABASE_ENV: &str = "DISCOURSEDB_DATABASE";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "DISCOURSEDB_CONFIG";

/// Top-level TOML configuration. Every section and field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind_address: String,
    pub page_size: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5780".to_string(),
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file. Unlike [`TomlConfig::load_or_default`] a missing
    /// file is an error here.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Locate and parse the config file, falling back to defaults when none exists.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(cli_path: Option<&Path>) -> Result<Self> {
        match locate_config_file(cli_path) {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            None => {
                warn!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Config file location: CLI argument, then `DISCOURSEDB_CONFIG`, then the
/// platform config directory.
pub fn locate_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("discoursedb").join("config.toml"))
}

/// Resolve the database file following the documented priority order
pub fn resolve_database_path(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATABASE_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.database.path {
        return path.clone();
    }

    // Priority 4: OS-dependent default
    default_database_path()
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("discoursedb"))
        .unwrap_or_else(|| PathBuf::from("./discoursedb_data"))
        .join("discoursedb.db")
}
