//! Error types for dayrun
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, missing vault, unknown instance)
//! - 3: State conflict (instance already running, lock not acquired)
//! - 4: Operation failed (I/O, serialization)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the dayrun CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const STATE_CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for dayrun operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("not a dayrun vault: {0} (run `dayrun init` first)")]
    NotAVault(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    // State conflicts (exit code 3)
    #[error("instance is already running: {0}")]
    InstanceRunning(String),

    #[error("instance is not running: {0}")]
    InstanceNotRunning(String),

    #[error("lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::NotAVault(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidDate(_)
            | Error::TaskNotFound(_)
            | Error::InstanceNotFound(_) => exit_codes::USER_ERROR,

            // State conflicts
            Error::InstanceRunning(_)
            | Error::InstanceNotRunning(_)
            | Error::LockFailed(_) => exit_codes::STATE_CONFLICT,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable discriminator for JSON output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotAVault(_) => "not_a_vault",
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::InvalidDate(_) => "invalid_date",
            Error::TaskNotFound(_) => "task_not_found",
            Error::InstanceNotFound(_) => "instance_not_found",
            Error::InstanceRunning(_) => "instance_running",
            Error::InstanceNotRunning(_) => "instance_not_running",
            Error::LockFailed(_) => "lock_failed",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) => "toml_parse",
            Error::TomlSerialize(_) => "toml_serialize",
            Error::OperationFailed(_) => "operation_failed",
        }
    }
}

/// Result type alias for dayrun operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(Error::NotAVault(PathBuf::from("/tmp/x")).exit_code(), 2);
        assert_eq!(Error::InvalidDate("nope".into()).exit_code(), 2);
        assert_eq!(Error::InstanceRunning("abc".into()).exit_code(), 3);
        assert_eq!(Error::LockFailed(PathBuf::from("l")).exit_code(), 3);
        assert_eq!(Error::OperationFailed("x".into()).exit_code(), 4);
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(Error::InstanceNotFound("a".into()).kind(), "instance_not_found");
        assert_eq!(Error::InvalidArgument("a".into()).kind(), "invalid_argument");
    }
}
