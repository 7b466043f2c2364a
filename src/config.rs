//! Configuration management for keepup.
//!
//! Options come from the command line and, optionally, a YAML file. Values given
//! on the command line win; defaults fill whatever neither source sets.
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use regex::{Captures, Regex};
use serde::Deserialize;

use crate::{cli::Cli, duration, error::ConfigError};

/// Log file used when daemonizing without `--log`.
pub const DEFAULT_LOGFILE: &str = "keepup.log";

/// Back-off applied when none is configured.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Restarts allowed per window when none is configured.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("env var pattern is valid")
});

/// A back-off value as written in YAML: a bare number of seconds or a duration string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum BackoffValue {
    Seconds(u64),
    Text(String),
}

impl BackoffValue {
    fn resolve(&self) -> Result<Duration, ConfigError> {
        match self {
            BackoffValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            BackoffValue::Text(raw) => duration::parse(raw),
        }
    }
}

/// Contents of a `--config` YAML file. Every key is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Command to supervise.
    pub command: Option<String>,
    /// Log file used when daemonized.
    pub log: Option<PathBuf>,
    /// Back-off before restarting a failed command.
    pub sleep: Option<BackoffValue>,
    /// Restart attempts allowed within 60 seconds.
    pub attempts: Option<u32>,
    /// Child pidfile.
    pub pidfile: Option<PathBuf>,
    /// Supervisor pidfile.
    pub supervisor_pidfile: Option<PathBuf>,
    /// Log line prefix.
    pub prefix: Option<String>,
    /// Whether to daemonize.
    pub daemonize: Option<bool>,
    /// Hook run on every restart.
    pub on_restart: Option<String>,
    /// Hook run when the restart budget is exhausted.
    pub on_error: Option<String>,
}

/// Immutable settings for one supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Command line handed to `/bin/sh -c`.
    pub command: String,
    /// Sleep inserted before restarting a child that failed.
    pub backoff: Duration,
    /// Restarts allowed within one restart window.
    pub max_attempts: u32,
    pub pidfile: Option<PathBuf>,
    pub supervisor_pidfile: Option<PathBuf>,
    pub logfile: PathBuf,
    pub daemonize: bool,
    pub on_restart: Option<String>,
    pub on_error: Option<String>,
    pub prefix: Option<String>,
}

impl SupervisorConfig {
    /// Builds a configuration for `command` with default settings.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            backoff: DEFAULT_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            pidfile: None,
            supervisor_pidfile: None,
            logfile: PathBuf::from(DEFAULT_LOGFILE),
            daemonize: false,
            on_restart: None,
            on_error: None,
            prefix: None,
        }
    }
}

/// What this invocation was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// Print the liveness of the process recorded in a pidfile.
    Status {
        /// Pidfile to inspect.
        pidfile: PathBuf,
    },
    /// Supervise a command.
    Supervise(SupervisorConfig),
}

/// Replaces `$VAR` and `${VAR}` references with values from the environment.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = ENV_VAR.replace_all(input, |caps: &Captures| match env::var(&caps[1]) {
        Ok(value) => value,
        Err(_) => {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
    });

    match missing {
        Some(name) => Err(ConfigError::MissingEnvVar(name)),
        None => Ok(expanded.into_owned()),
    }
}

/// Loads and parses a configuration file, expanding environment variables.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let expanded = expand_env_vars(&content)?;
    if expanded.trim().is_empty() {
        return Ok(FileConfig::default());
    }

    Ok(serde_yaml::from_str(&expanded)?)
}

/// Merges command-line options over `file` and validates the result.
pub fn resolve_with(cli: &Cli, file: FileConfig) -> Result<Invocation, ConfigError> {
    let pidfile = cli.pidfile.clone().or(file.pidfile);

    if cli.status {
        return pidfile
            .map(|pidfile| Invocation::Status { pidfile })
            .ok_or(ConfigError::MissingPidfile);
    }

    let command = cli
        .command
        .clone()
        .or(file.command)
        .filter(|command| !command.trim().is_empty())
        .ok_or(ConfigError::MissingCommand)?;

    let backoff = match (&cli.sleep, &file.sleep) {
        (Some(raw), _) => duration::parse(raw)?,
        (None, Some(value)) => value.resolve()?,
        (None, None) => DEFAULT_BACKOFF,
    };

    let max_attempts = cli
        .attempts
        .or(file.attempts)
        .unwrap_or(DEFAULT_MAX_ATTEMPTS);
    if max_attempts == 0 {
        return Err(ConfigError::InvalidAttempts(max_attempts));
    }

    Ok(Invocation::Supervise(SupervisorConfig {
        command,
        backoff,
        max_attempts,
        pidfile,
        supervisor_pidfile: cli.supervisor_pidfile.clone().or(file.supervisor_pidfile),
        logfile: cli
            .logfile
            .clone()
            .or(file.log)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGFILE)),
        daemonize: cli.daemonize || file.daemonize.unwrap_or(false),
        on_restart: cli.on_restart.clone().or(file.on_restart),
        on_error: cli.on_error.clone().or(file.on_error),
        prefix: cli.prefix.clone().or(file.prefix),
    }))
}

/// Resolves the invocation described by `cli`, reading `--config` if given.
pub fn resolve(cli: &Cli) -> Result<Invocation, ConfigError> {
    let file = match &cli.config {
        Some(path) => load_file(path)?,
        None => FileConfig::default(),
    };
    resolve_with(cli, file)
}
