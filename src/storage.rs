//! Storage layer for dayrun
//!
//! Manages persistent engine state under the vault:
//!
//! ```text
//! <vault>/
//!   .dayrun.toml            # configuration (optional)
//!   tasks/                  # task notes (user content)
//!   .dayrun/                # engine state (never user-edited)
//!     day-state.json        # date-keyed per-day overlay map
//!     running.json          # currently-running instance records
//!     logs/
//!       2025-06.json        # monthly execution log, keyed by date
//! ```
//!
//! All state writes are atomic (temp + rename) and serialized through an
//! advisory file lock, so a second dayrun process pointed at the same vault
//! cannot interleave partial writes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::lock::{self, FileLock};

/// Storage manager for dayrun state
#[derive(Debug, Clone)]
pub struct Storage {
    vault_root: PathBuf,
    tasks_dir: PathBuf,
    state_dir: PathBuf,
    lock_timeout_ms: u64,
}

impl Storage {
    /// Create a storage manager for the given vault root and configuration
    pub fn new(vault_root: PathBuf, config: &Config) -> Self {
        let tasks_dir = vault_root.join(&config.paths.tasks_dir);
        let state_dir = vault_root.join(&config.paths.state_dir);
        Self {
            vault_root,
            tasks_dir,
            state_dir,
            lock_timeout_ms: config.lock.timeout_ms,
        }
    }

    /// Storage with default configuration, mainly for tests
    pub fn for_vault(vault_root: PathBuf) -> Self {
        let config = Config::default();
        Self::new(vault_root, &config)
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    /// Directory holding task notes
    pub fn tasks_dir(&self) -> &Path {
        &self.tasks_dir
    }

    /// Directory holding engine state
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Per-day overlay map file
    pub fn day_state_file(&self) -> PathBuf {
        self.state_dir.join("day-state.json")
    }

    /// Running-instance records file
    pub fn running_file(&self) -> PathBuf {
        self.state_dir.join("running.json")
    }

    /// Directory of monthly execution logs
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// Execution log file for a `YYYY-MM` month key
    pub fn log_file(&self, month: &str) -> PathBuf {
        self.logs_dir().join(format!("{}.json", month))
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the vault directory structure
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.tasks_dir)?;
        fs::create_dir_all(&self.state_dir)?;
        fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    /// Whether this vault has been initialized
    pub fn is_initialized(&self) -> bool {
        self.state_dir.exists()
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Read a JSON state file, returning the default when it is absent.
    ///
    /// Corrupt content also falls back to the default: one damaged state
    /// file must never take the whole day's list down. The recovery is
    /// logged so the damage is visible.
    pub fn read_json_or_default<T>(&self, path: &Path) -> T
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            return T::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "corrupt state file, using defaults");
                    T::default()
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "unreadable state file, using defaults");
                T::default()
            }
        }
    }

    /// Write a JSON state file atomically under the file's lock
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let _lock = self.lock_for(path)?;
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read-modify-write a JSON state file under its lock.
    ///
    /// The mutator sees the current content (or the default) and its result
    /// is persisted before the lock is released.
    pub fn update_json<T, R, F>(&self, path: &Path, f: F) -> Result<R>
    where
        T: DeserializeOwned + Default + Serialize,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _lock = self.lock_for(path)?;
        let mut data: T = self.read_json_or_default(path);
        let result = f(&mut data)?;
        let json = serde_json::to_string_pretty(&data)?;
        lock::write_atomic(path, json.as_bytes())?;
        Ok(result)
    }

    fn lock_for(&self, path: &Path) -> Result<FileLock> {
        let lock_path = PathBuf::from(format!("{}.lock", path.display()));
        FileLock::acquire(lock_path, self.lock_timeout_ms)
    }
}
