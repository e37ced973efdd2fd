//! Configuration management for float
//!
//! Handles the ~/.float/ directory structure and config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::PodStatus;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Status given to pods created without an explicit one
    #[serde(default)]
    pub default_status: PodStatus,
    /// Type tag for files added without one
    #[serde(default = "default_file_type")]
    pub default_file_type: String,
    /// Fallback log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_file_type() -> String {
    "text".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_status: PodStatus::default(),
            default_file_type: default_file_type(),
            log_level: default_log_level(),
        }
    }
}

/// Returns the path to the float home directory (~/.float)
pub fn float_home() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".float"))
}

/// Paths to the float files
#[derive(Debug, Clone)]
pub struct FloatPaths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub db_file: PathBuf,
}

impl FloatPaths {
    pub fn new() -> Result<Self> {
        Ok(Self::at(float_home()?))
    }

    /// Lay the files out under an arbitrary root
    pub fn at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            config: root.join("config.toml"),
            db_file: root.join("float.db"),
            root,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.root).context("Failed to create float root")?;
        Ok(())
    }

    /// Check if float has been initialized
    pub fn is_initialized(&self) -> bool {
        self.config.exists() && self.db_file.exists()
    }
}

/// Load configuration, falling back to defaults when config.toml is missing
pub fn load_config(paths: &FloatPaths) -> Result<Config> {
    if !paths.config.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&paths.config).context("Failed to read config.toml")?;
    toml::from_str(&content).context("Failed to parse config.toml")
}

pub fn save_config(paths: &FloatPaths, config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(&paths.config, content).context("Failed to write config.toml")?;
    Ok(())
}
