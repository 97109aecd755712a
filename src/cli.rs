// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `workchain`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "workchain",
    version,
    about = "Run a named chain of dependent, constraint-gated work items.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Workchain.toml` (or `$WORKCHAIN_CONFIG`) if it exists,
    /// otherwise built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Number of sequential blur stages in the built-in image pipeline.
    #[arg(
        long,
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(1..=10)
    )]
    pub blur_level: u8,

    /// Image URI fed to the first blur stage of the built-in pipeline.
    #[arg(long, value_name = "URI", default_value = "file:///pictures/test.png")]
    pub image: String,

    /// Start with this constraint unsatisfied (repeatable), e.g. `charging`.
    #[arg(long = "hold", value_name = "CONSTRAINT")]
    pub hold: Vec<String>,

    /// Satisfy every held constraint after this many milliseconds.
    #[arg(long, value_name = "MS")]
    pub release_after_ms: Option<u64>,

    /// Simulated duration of each work body in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 300)]
    pub work_delay_ms: u64,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WORKCHAIN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the chain plan, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
