//! dayrun - Daily Task Scheduler Library
//!
//! This library provides the core functionality for the dayrun CLI: a
//! local, single-process scheduler that reconciles task definitions,
//! execution history, and per-day overlay state into the authoritative
//! instance list for any calendar date.
//!
//! # Core Concepts
//!
//! - **Task definitions**: markdown notes with flat frontmatter, one-off
//!   or recurring ("routines")
//! - **Task instances**: dated, stateful occurrences with opaque identity
//! - **Day state**: the per-date overlay of hidden/deleted/replayed
//!   instances, slot overrides, and order numbers
//! - **Execution log**: monthly records of completed instances
//! - **Running persistence**: restart-safe recovery of in-flight timers
//!
//! # Module Organization
//!
//! - `cli`: command-line interface using clap
//! - `config`: configuration loading from `.dayrun.toml`
//! - `error`: error types and result aliases
//! - `frontmatter`: flat key/value note headers
//! - `vault`: task-note catalog and definition parsing
//! - `recurrence`: recurrence rules and due evaluation
//! - `slot`: the four fixed day-part slots
//! - `instance`: task instances and identity rules
//! - `day_state`: per-date overlay store
//! - `exec_log`: monthly execution log
//! - `running`: running-instance persistence and restoration
//! - `sorter`: deterministic per-slot ordering
//! - `loader`: the per-day reconciliation pass
//! - `engine`: user-facing operations over one vault
//! - `boundary`: slot-boundary scheduling
//! - `notify`: user notification collaborator
//! - `storage`: file storage and directory management
//! - `lock`: file locking and atomic writes

pub mod boundary;
pub mod cli;
pub mod config;
pub mod day_state;
pub mod engine;
pub mod error;
pub mod exec_log;
pub mod frontmatter;
pub mod instance;
pub mod loader;
pub mod lock;
pub mod notify;
pub mod output;
pub mod recurrence;
pub mod running;
pub mod slot;
pub mod sorter;
pub mod storage;
pub mod vault;

pub use error::{Error, Result};
