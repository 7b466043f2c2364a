//! Error handling for keepup.
use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::duration;

/// Exit status for configuration errors and unrecoverable OS failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit status reported when the restart budget is exhausted.
pub const EXIT_BAILED: u8 = 2;

/// Problems with the options the supervisor was started with.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No child command was supplied.
    #[error("<command> required")]
    MissingCommand,

    /// `--status` was requested without a pidfile to inspect.
    #[error("--pidfile required")]
    MissingPidfile,

    /// The attempt ceiling must allow at least one restart.
    #[error("--attempts must be at least 1, got {0}")]
    InvalidAttempts(u32),

    /// A duration string could not be parsed.
    #[error("invalid duration '{0}' (expected e.g. 1, 500ms, 5s, 2m)")]
    InvalidDuration(String),

    /// The configuration file could not be read.
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid YAML for this tool.
    #[error("invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration file references an unset environment variable.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Error type for pidfile operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Error writing a pidfile.
    #[error("failed to write pidfile {path:?}: {source}")]
    Write {
        /// Path of the pidfile.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// Error reading a pidfile or its metadata.
    #[error("failed to read pidfile {path:?}: {source}")]
    Read {
        /// Path of the pidfile.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The pidfile does not hold a positive decimal PID.
    #[error("pidfile {path:?} does not contain a valid pid: {contents:?}")]
    Parse {
        /// Path of the pidfile.
        path: PathBuf,
        /// The trimmed contents that failed to parse.
        contents: String,
    },
}

/// Errors that terminate the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    PidFile(#[from] PidFileError),

    /// The child command could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// Waiting on the child failed.
    #[error("failed to wait for pid {pid}: {source}")]
    Wait {
        /// PID being waited on.
        pid: u32,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The logfile used for daemonized output could not be opened.
    #[error("failed to open log file {path:?}: {source}")]
    LogFile {
        /// Path of the logfile.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// Installing the termination signal handlers failed.
    #[error("failed to install signal handlers: {0}")]
    Signals(String),

    /// A raw OS call (fork, setsid, dup2, kill) failed.
    #[error("system call failed: {0}")]
    Os(#[from] nix::errno::Errno),

    /// The child restarted too often within the restart window.
    #[error("{attempts} restarts within {}, bailing", window_label(.window))]
    RestartBudgetExhausted {
        /// The configured attempt ceiling that was reached.
        attempts: u32,
        /// How much of the restart window had been consumed.
        window: Duration,
    },
}

fn window_label(window: &Duration) -> String {
    duration::format_long(*window)
}

impl SupervisorError {
    /// Process exit status matching this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            SupervisorError::RestartBudgetExhausted { .. } => EXIT_BAILED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<ctrlc::Error> for SupervisorError {
    fn from(err: ctrlc::Error) -> Self {
        SupervisorError::Signals(err.to_string())
    }
}
