//! Detaching the supervisor from its terminal.
use std::{
    fs::{File, OpenOptions},
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    path::Path,
};

use nix::{
    errno::Errno,
    unistd::{ForkResult, fork, setsid},
};

use crate::error::SupervisorError;

/// Forks into the background and starts a new session.
///
/// The parent exits with status 0. In the surviving child stdin reads from
/// `/dev/null` and stdout/stderr append to `logfile`, so tracing output and the
/// supervised command's output both land in the log. Both files are opened before
/// forking so failures are still reported on the invoking terminal.
pub fn daemonize(logfile: &Path) -> Result<(), SupervisorError> {
    let log = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(logfile)
        .map_err(|source| SupervisorError::LogFile {
            path: logfile.to_path_buf(),
            source,
        })?;
    let devnull = File::open("/dev/null").map_err(|source| SupervisorError::LogFile {
        path: "/dev/null".into(),
        source,
    })?;

    match unsafe { fork() }? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid()?;

    redirect(devnull.as_raw_fd(), libc::STDIN_FILENO)?;
    redirect(log.as_raw_fd(), libc::STDOUT_FILENO)?;
    redirect(log.as_raw_fd(), libc::STDERR_FILENO)?;

    Ok(())
}

fn redirect(from: i32, to: i32) -> Result<(), Errno> {
    if unsafe { libc::dup2(from, to) } < 0 {
        return Err(Errno::last());
    }
    Ok(())
}
