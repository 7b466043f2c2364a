//! Liveness reporting for a pidfile.
use std::{
    io::{self, IsTerminal},
    time::{Duration, SystemTime},
};

use nix::{errno::Errno, sys::signal, unistd::Pid};

use crate::{duration, error::PidFileError, pidfile::PidFile};

const GREY: &str = "\x1b[90m";
const GREEN_BOLD: &str = "\x1b[1;32m";
const RED_BOLD: &str = "\x1b[1;31m";
const RESET: &str = "\x1b[0m";

/// State of the process recorded in a pidfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The process exists.
    Alive {
        /// PID read from the pidfile.
        pid: i32,
        /// Time since the pidfile was written.
        uptime: Duration,
    },
    /// No process with that PID exists.
    Dead {
        /// PID read from the pidfile.
        pid: i32,
    },
}

/// Returns whether a process with `pid` exists, without signalling it.
pub fn is_alive(pid: i32) -> bool {
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        // exists, but belongs to someone else
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Reads `pidfile` and probes the recorded process.
pub fn check(pidfile: &PidFile) -> Result<Liveness, PidFileError> {
    let record = pidfile.read()?;
    if !is_alive(record.pid) {
        return Ok(Liveness::Dead { pid: record.pid });
    }

    let uptime = SystemTime::now()
        .duration_since(record.modified)
        .unwrap_or(Duration::ZERO);
    Ok(Liveness::Alive {
        pid: record.pid,
        uptime,
    })
}

/// Formats a status line, optionally with ANSI colours.
pub fn render(liveness: &Liveness, color: bool) -> String {
    let paint = |code: &str, text: String| {
        if color {
            format!("{code}{text}{RESET}")
        } else {
            text
        }
    };

    match liveness {
        Liveness::Alive { pid, uptime } => format!(
            "{} : {} : uptime {}",
            paint(GREY, pid.to_string()),
            paint(GREEN_BOLD, "alive".to_string()),
            duration::format_long(*uptime),
        ),
        Liveness::Dead { pid } => format!(
            "{} : {}",
            paint(GREY, pid.to_string()),
            paint(RED_BOLD, "dead".to_string()),
        ),
    }
}

/// Prints the status of the process recorded in `pidfile`.
pub fn show_status(pidfile: &PidFile) -> Result<Liveness, PidFileError> {
    let liveness = check(pidfile)?;
    println!("{}", render(&liveness, io::stdout().is_terminal()));
    Ok(liveness)
}
