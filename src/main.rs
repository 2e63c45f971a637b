//! dayrun - daily task-execution scheduler CLI
//!
//! A standalone CLI over a vault of task notes: recurring and one-off
//! tasks, per-day instance lists, and restart-safe execution timers.

use clap::Parser;
use dayrun::cli::Cli;
use dayrun::output::{emit_error, infer_command_name_from_args};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    // Tracing is opt-in via RUST_LOG; invalid or oversized filters are
    // ignored so a bad environment never stops the CLI from starting.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(err) = cli.run() {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}
