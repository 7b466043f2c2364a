//! Keepup is a single-process supervisor for Unix-like systems. It runs one shell
//! command, restarts it whenever it exits, and gives up once the command
//! crash-loops faster than its restart budget allows. Pidfiles, restart and
//! error hooks, daemonization and a `--status` query round out the tool.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Detaching from the controlling terminal.
pub mod daemon;

/// Duration parsing and human-readable formatting.
pub mod duration;

/// Error handling.
pub mod error;

/// Hook commands run on restart and bail-out.
pub mod hooks;

/// Logging setup.
pub mod logs;

/// Pidfile persistence.
pub mod pidfile;

/// Restart rate limiting.
pub mod restart;

/// Child process spawning and reaping.
pub mod runner;

/// Termination signal handling.
pub mod signals;

/// Status query.
pub mod status;

/// The supervise loop.
pub mod supervisor;

/// Handing the controlling terminal to the child.
pub mod terminal;

#[doc(hidden)]
pub mod test_utils;
