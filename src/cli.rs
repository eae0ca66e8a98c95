// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for the `rootwatch` demo binary.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rootwatch",
    version,
    about = "Watch root directories and report meaningful content changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Root directories to monitor. Each becomes one root boundary.
    #[arg(value_name = "ROOT", required = true)]
    pub roots: Vec<PathBuf>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Rootwatch.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Rootwatch.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ROOTWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
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
