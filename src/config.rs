//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXSEEK_CONFIG` (environment variable)
//! 2. `~/.config/mboxseek/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxseek\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MboxError, Result};
use crate::store::block::{DEFAULT_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Scanner tuning.
    pub scan: ScanConfig,
    /// Random-access message store.
    pub store: StoreConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override directory for the log file. Index files are written next to
    /// the MBOX, or under the platform cache directory when that fails.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Write the index next to (or cached for) the MBOX after a scan.
    pub persist_index: bool,
}

/// Scanner tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Bytes per block read (default: 4096, minimum 16).
    pub block_size: usize,
    /// Drop a leading "Mail System Internal Data" pseudo-message.
    pub skip_internal_data: bool,
}

/// Random-access message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of raw messages kept in the LRU cache.
    pub lru_cache_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
            persist_index: true,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            skip_internal_data: true,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { lru_cache_size: 50 }
    }
}

impl Config {
    /// Reject values the scanner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.scan.block_size < MIN_BLOCK_SIZE {
            return Err(MboxError::InvalidConfig(format!(
                "scan.block_size must be at least {MIN_BLOCK_SIZE}, got {}",
                self.scan.block_size
            )));
        }
        if self.store.lru_cache_size == 0 {
            return Err(MboxError::InvalidConfig(
                "store.lru_cache_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found, on parse error,
/// or when the file holds out-of-range values.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => match cfg.validate() {
                        Ok(()) => {
                            tracing::info!(path = %path.display(), "Loaded config");
                            return cfg;
                        }
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "Rejected config, using defaults"
                            );
                        }
                    },
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXSEEK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mboxseek").join("config.toml"))
}

/// Return the directory that holds the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxseek")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mboxseek.log")
}
