//! Configuration loading and management
//!
//! Handles parsing of `.dayrun.toml` at the vault root. Every field has a
//! default so an empty or absent file is a working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file at the vault root
pub const CONFIG_FILE: &str = ".dayrun.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path configuration
    #[serde(default)]
    pub paths: PathsConfig,

    /// Lock configuration
    #[serde(default)]
    pub lock: LockConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            lock: LockConfig::default(),
        }
    }
}

/// Directory names inside the vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding task notes, relative to the vault root
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: String,

    /// Directory holding engine state, relative to the vault root
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

fn default_tasks_dir() -> String {
    "tasks".to_string()
}

fn default_state_dir() -> String {
    ".dayrun".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tasks_dir: default_tasks_dir(),
            state_dir: default_state_dir(),
        }
    }
}

/// File locking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Milliseconds to wait for a state-file lock before giving up
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from the vault root, falling back to defaults
    /// when the file is absent.
    pub fn load(vault_root: &Path) -> Result<Self> {
        let path = vault_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Serialize the default configuration for `dayrun init`
    pub fn default_toml() -> Result<String> {
        Ok(toml::to_string_pretty(&Config::default())?)
    }
}

/// Resolve the vault root: explicit flag, then `DAYRUN_VAULT`, then the
/// current directory when it looks like a vault, then the per-user data
/// directory.
pub fn resolve_vault(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    let cwd = std::env::current_dir()?;
    if cwd.join(CONFIG_FILE).exists() || cwd.join(default_state_dir()).exists() {
        return Ok(cwd);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "dayrun") {
        return Ok(dirs.data_dir().to_path_buf());
    }

    Ok(cwd)
}
