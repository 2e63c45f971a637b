//! File locking and atomic operations for dayrun
//!
//! State files (`day-state.json`, `running.json`, monthly logs) are shared
//! with any other dayrun process pointed at the same vault, so writes go
//! through:
//! - File locking (fs2/flock) with a bounded wait
//! - Atomic write pattern (write temp + rename)

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Default retry interval when waiting for a lock
const LOCK_RETRY_INTERVAL_MS: u64 = 50;

fn is_lock_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }

    // On Windows, fs2/libc can surface lock/sharing violations as "Other".
    // Treat them as contention so callers get Err(LockFailed) after timeout.
    #[cfg(windows)]
    {
        matches!(err.raw_os_error(), Some(32) | Some(33))
    }
    #[cfg(not(windows))]
    {
        false
    }
}

/// A file lock guard that releases the lock when dropped
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on a file with timeout
    ///
    /// If the file doesn't exist, it will be created.
    /// Returns an error if the lock cannot be acquired within the timeout.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        let retry_interval = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(FileLock {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_lock_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(Error::LockFailed(path.to_path_buf()));
                    }
                    std::thread::sleep(retry_interval);
                }
                Err(e) => {
                    return Err(Error::Io(e));
                }
            }
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Write data atomically using temp file + rename
///
/// Readers either see the old content or the new content, never a partial
/// write.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    fs::rename(&temp_path, path)?;

    Ok(())
}
