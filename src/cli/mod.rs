//! Command-line interface for dayrun
//!
//! This module defines the CLI structure using clap derive macros. The
//! binary is a thin surface: every command resolves its arguments, calls
//! one engine operation, and prints the result.

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::notify::{NullNotifier, StderrNotifier};
use crate::output::OutputOptions;
use crate::slot::SlotKey;

mod init;
mod show;
mod task;

/// dayrun - daily task-execution scheduler
///
/// Maintains a vault of task notes and produces, for any date, the ordered
/// list of task instances to execute, with per-day hide/delete/replay and
/// restart-safe running timers.
#[derive(Parser, Debug)]
#[command(name = "dayrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the vault (defaults to the current directory)
    #[arg(long, global = true, env = "DAYRUN_VAULT")]
    pub vault: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a vault in the target directory
    Init,

    /// Show the instance list for a date
    Show {
        /// Date to show (YYYY-MM-DD, default today)
        date: Option<String>,
    },

    /// Start an instance (stops any other running instance first)
    Start {
        /// Instance id (unique prefix accepted)
        instance: String,

        /// Date the instance belongs to (default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Stop the running instance and record its execution
    Stop {
        /// Instance id (unique prefix accepted)
        instance: String,

        /// Date the instance belongs to (default today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Duplicate ("replay") an instance with a fresh identity
    Duplicate {
        instance: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an instance (routines: today only; one-offs: permanently)
    Delete {
        instance: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Hide an instance for one date without touching its definition
    Hide {
        instance: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Move an instance to another time slot
    Move {
        instance: String,

        /// Target slot: 0:00-8:00, 8:00-12:00, 12:00-16:00, 16:00-0:00, none
        slot: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Place an instance directly after another in the same slot
    Reorder {
        instance: String,

        /// Instance to insert after
        after: String,

        #[arg(long)]
        date: Option<String>,
    },

    /// Show or set the comment recorded for a completed instance
    Comment {
        instance: String,

        /// Replace the comment instead of showing it
        #[arg(long)]
        set: Option<String>,

        #[arg(long)]
        date: Option<String>,
    },

    /// Run the slot-boundary pass for today's view
    Tick,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let options = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let vault = crate::config::resolve_vault(self.vault.clone())?;

        match self.command {
            Commands::Init => init::run(vault, options),
            command => {
                let notifier: Box<dyn crate::notify::Notifier> = if options.quiet || options.json {
                    Box::new(NullNotifier)
                } else {
                    Box::new(StderrNotifier)
                };
                let mut engine = Engine::open(vault, notifier)?;
                dispatch(&mut engine, command, options)
            }
        }
    }
}

fn dispatch(engine: &mut Engine, command: Commands, options: OutputOptions) -> Result<()> {
    let today = Local::now().date_naive();
    let now = Local::now().naive_local();

    match command {
        Commands::Init => unreachable!("handled before opening the engine"),
        Commands::Show { date } => show::run(engine, parse_date(date.as_deref(), today)?, today, options),
        Commands::Start { instance, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::start(engine, date, &instance, now, options)
        }
        Commands::Stop { instance, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::stop(engine, date, &instance, now, options)
        }
        Commands::Duplicate { instance, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::duplicate(engine, date, &instance, today, options)
        }
        Commands::Delete { instance, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::delete(engine, date, &instance, today, options)
        }
        Commands::Hide { instance, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::hide(engine, date, &instance, today, options)
        }
        Commands::Move { instance, slot, date } => {
            let date = parse_date(date.as_deref(), today)?;
            let slot: SlotKey = slot.parse()?;
            task::move_slot(engine, date, &instance, slot, today, options)
        }
        Commands::Reorder { instance, after, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::reorder(engine, date, &instance, &after, today, options)
        }
        Commands::Comment { instance, set, date } => {
            let date = parse_date(date.as_deref(), today)?;
            task::comment(engine, date, &instance, set.as_deref(), today, options)
        }
        Commands::Tick => task::tick(engine, today, now, options),
    }
}

/// Parse a `YYYY-MM-DD` argument, defaulting to today
pub fn parse_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate> {
    match raw {
        None => Ok(today),
        Some("today") => Ok(today),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| Error::InvalidDate(raw.to_string())),
    }
}

/// Resolve an instance-id argument against a day's plan, accepting a
/// unique prefix.
pub fn resolve_instance_id(
    plan: &crate::loader::DayPlan,
    needle: &str,
) -> Result<String> {
    let mut matches = plan.instances.iter().filter_map(|i| {
        i.instance_id
            .as_deref()
            .filter(|id| id.starts_with(needle))
    });

    let Some(first) = matches.next() else {
        return Err(Error::InstanceNotFound(needle.to_string()));
    };
    if let Some(second) = matches.next() {
        if second != first {
            return Err(Error::InvalidArgument(format!(
                "ambiguous instance prefix: {}",
                needle
            )));
        }
    }
    Ok(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_defaults_and_validates() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(parse_date(None, today).unwrap(), today);
        assert_eq!(parse_date(Some("today"), today).unwrap(), today);
        assert_eq!(
            parse_date(Some("2025-01-02"), today).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
        );
        assert!(matches!(
            parse_date(Some("last tuesday"), today),
            Err(Error::InvalidDate(_))
        ));
    }
}
