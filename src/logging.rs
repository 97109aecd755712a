// src/logging.rs

//! Diagnostics for the `workchain` binary.
//!
//! Stdout belongs to the run itself: one `[chain] id:kind=STATE ...` line per
//! status update of the followed chain, the final chain outcome, the output
//! of every `OUTPUT`-tagged item, or the dry-run report. Everything emitted
//! through `tracing` (admission decisions, constraint edges, executor
//! activity) goes to stderr, so piping stdout never mixes the two.
//!
//! The filter comes from `--log-level` when given. Otherwise
//! `WORKCHAIN_LOG` is read as a full `EnvFilter` directive, so
//! `WORKCHAIN_LOG=info,workchain::engine=debug` narrows verbose output to
//! the scheduler. Without either, `info` is used.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "WORKCHAIN_LOG";

/// Install the global subscriber. Call once, before the manager starts.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(log_directive(cli_level, env.as_deref()))
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log filter: {e}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

/// Filter directive for the given flag and `WORKCHAIN_LOG` value.
///
/// A blank environment value counts as unset.
pub fn log_directive(cli_level: Option<LogLevel>, env: Option<&str>) -> String {
    if let Some(level) = cli_level {
        return level_name(level).to_string();
    }
    match env.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => "info".to_string(),
    }
}

fn level_name(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
