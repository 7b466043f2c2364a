//! Command-line interface for keepup.
use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use tracing::level_filters::LevelFilter;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let lowercase = trimmed.to_ascii_lowercase();
        let level = match lowercase.as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for keepup.
#[derive(Parser, Debug)]
#[command(name = "keepup", version, author)]
#[command(
    about = "Keep a single command running, restarting it whenever it exits",
    long_about = None
)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevelArg>,

    /// YAML file providing defaults for any of the options below.
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file used when daemonized [keepup.log].
    #[arg(short = 'l', long = "log", value_name = "PATH")]
    pub logfile: Option<PathBuf>,

    /// Time to wait before restarting a failed command, e.g. 1, 500ms, 5s [1].
    #[arg(short = 's', long, value_name = "DURATION")]
    pub sleep: Option<String>,

    /// Report whether the process in --pidfile is alive, then exit.
    #[arg(short = 'S', long)]
    pub status: bool,

    /// Write the child's pid to this file.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub pidfile: Option<PathBuf>,

    /// Write the supervisor's own pid to this file.
    #[arg(short = 'm', long, value_name = "PATH")]
    pub supervisor_pidfile: Option<PathBuf>,

    /// Prefix added to every log line.
    #[arg(short = 'P', long, value_name = "STR")]
    pub prefix: Option<String>,

    /// Run in the background, logging to --log.
    #[arg(short = 'd', long)]
    pub daemonize: bool,

    /// Restart attempts allowed within 60 seconds [10].
    #[arg(short = 'a', long, value_name = "N")]
    pub attempts: Option<u32>,

    /// Shell command executed on every restart.
    #[arg(short = 'R', long, value_name = "CMD")]
    pub on_restart: Option<String>,

    /// Shell command executed when restarts are exhausted.
    #[arg(short = 'E', long, value_name = "CMD")]
    pub on_error: Option<String>,

    /// Command to supervise, interpreted by /bin/sh.
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,
}

/// Parses the process arguments.
pub fn parse_args() -> Result<Cli, clap::Error> {
    Cli::try_parse()
}
