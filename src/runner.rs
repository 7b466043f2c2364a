//! Spawning and reaping the supervised command.
use std::{
    fmt, io,
    os::unix::process::{CommandExt, ExitStatusExt},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{Signal, killpg},
    unistd::Pid,
};
use tracing::{debug, info, warn};

use crate::{
    error::SupervisorError,
    pidfile::PidFile,
    signals::{POLL_INTERVAL, SignalBridge},
    terminal::ForegroundTerminal,
};

/// Shell used to interpret command strings.
pub const SHELL: &str = "/bin/sh";

const DISCARD_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// How a child process terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClassification {
    /// Killed by the given signal number.
    Signaled(i32),
    /// Exited with a nonzero status.
    ExitedWithCode(i32),
    /// Exited with status 0.
    ExitedCleanly,
}

impl ExitClassification {
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(signal) = status.signal() {
            return ExitClassification::Signaled(signal);
        }

        match status.code() {
            Some(0) => ExitClassification::ExitedCleanly,
            Some(code) => ExitClassification::ExitedWithCode(code),
            None => ExitClassification::ExitedWithCode(-1),
        }
    }

    /// Whether the exit warrants a back-off before restarting.
    pub fn is_failure(&self) -> bool {
        !matches!(self, ExitClassification::ExitedCleanly)
    }
}

impl fmt::Display for ExitClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitClassification::Signaled(raw) => match Signal::try_from(*raw) {
                Ok(signal) => write!(f, "signal({signal})"),
                Err(_) => write!(f, "signal({raw})"),
            },
            ExitClassification::ExitedWithCode(code) => write!(f, "exit({code})"),
            ExitClassification::ExitedCleanly => write!(f, "exit(0)"),
        }
    }
}

/// Result of waiting on a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The child terminated.
    Exited(ExitClassification),
    /// A shutdown signal arrived before the child terminated.
    Interrupted(Signal),
}

/// A spawned shell and the process group it leads.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    pid: u32,
    started_at: Instant,
    holds_terminal: bool,
}

impl ChildProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the child was started as the terminal's foreground job.
    pub fn holds_terminal(&self) -> bool {
        self.holds_terminal
    }

    /// How long ago the process was spawned.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Blocks until the child exits or a shutdown is requested through `signals`.
    pub fn wait(&mut self, signals: &SignalBridge) -> io::Result<WaitOutcome> {
        loop {
            if let Some(signal) = signals.requested() {
                return Ok(WaitOutcome::Interrupted(signal));
            }

            match self.child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(WaitOutcome::Exited(ExitClassification::from_status(
                        status,
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Sends `signal` to the child's whole process group.
    ///
    /// An already empty group is not an error.
    pub fn signal_group(&self, signal: Signal) -> Result<(), Errno> {
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Waits up to `timeout` for the child to exit, reaping it if it does.
    pub fn reap(&mut self, timeout: Duration) -> Option<ExitClassification> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => return Some(ExitClassification::from_status(status)),
                Ok(None) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Ok(None) => return None,
                Err(err) => {
                    debug!("failed to reap pid {}: {err}", self.pid);
                    return None;
                }
            }
        }
    }
}

/// Where a spawned shell reads its standard input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Inherit the supervisor's stdin.
    Inherit,
    /// Inherit stdin and take over the terminal's foreground before exec.
    Foreground,
    /// Read from `/dev/null`.
    Null,
}

/// Builds `/bin/sh -c <command>` in its own process group with default
/// dispositions for the signals the supervisor intercepts.
pub fn shell_command(command: &str, input: InputMode) -> Command {
    let mut cmd = Command::new(SHELL);
    cmd.arg("-c").arg(command);
    if input == InputMode::Null {
        cmd.stdin(Stdio::null());
    }
    let foreground = input == InputMode::Foreground;

    unsafe {
        cmd.pre_exec(move || {
            for signal in [libc::SIGTERM, libc::SIGQUIT, libc::SIGINT] {
                if libc::signal(signal, libc::SIG_DFL) == libc::SIG_ERR {
                    return Err(io::Error::last_os_error());
                }
            }

            // Lead a fresh process group so shutdown can reach every descendant
            // without signalling the supervisor's own group.
            if libc::setpgid(0, 0) < 0 {
                return Err(io::Error::last_os_error());
            }

            // A supervisor sharing its terminal has SIGTTOU ignored, so this cannot stop us.
            // Failing to grab the terminal leaves the child a background job.
            if foreground {
                libc::tcsetpgrp(libc::STDIN_FILENO, libc::getpid());
            }
            if libc::signal(libc::SIGTTOU, libc::SIG_DFL) == libc::SIG_ERR {
                return Err(io::Error::last_os_error());
            }

            #[cfg(target_os = "linux")]
            {
                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM, 0, 0, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            Ok(())
        });
    }

    cmd
}

/// Launches a shell command, returning the running process.
pub fn spawn_shell(command: &str, input: InputMode) -> io::Result<ChildProcess> {
    let child = shell_command(command, input).spawn()?;
    let pid = child.id();
    Ok(ChildProcess {
        child,
        pid,
        started_at: Instant::now(),
        holds_terminal: input == InputMode::Foreground,
    })
}

/// Spawns the supervised command and records its PID.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    pidfile: Option<PidFile>,
    terminal: Option<ForegroundTerminal>,
}

impl ProcessRunner {
    pub fn new(pidfile: Option<&Path>) -> Self {
        Self {
            pidfile: pidfile.map(PidFile::new),
            terminal: None,
        }
    }

    /// Lets spawned children take over `terminal` while they run.
    pub fn share_terminal(&mut self, terminal: ForegroundTerminal) {
        self.terminal = Some(terminal);
    }

    /// Starts `command` through the shell and writes the pidfile if configured.
    pub fn spawn(&self, command: &str) -> Result<ChildProcess, SupervisorError> {
        debug!("{SHELL} -c \"{command}\"");
        let input = match self.terminal {
            Some(_) => InputMode::Foreground,
            None => InputMode::Inherit,
        };
        let mut child = spawn_shell(command, input).map_err(|source| SupervisorError::Spawn {
            command: command.to_string(),
            source,
        })?;
        info!("child {}", child.pid());

        if let Some(pidfile) = &self.pidfile {
            info!("write pid to {}", pidfile.path().display());
            if let Err(err) = pidfile.write(child.pid()) {
                self.discard(&mut child);
                return Err(err.into());
            }
        }

        Ok(child)
    }

    /// Kills a child that must not keep running.
    fn discard(&self, child: &mut ChildProcess) {
        if let Err(err) = child.signal_group(Signal::SIGKILL) {
            warn!("failed to kill pid {}: {err}", child.pid());
        }
        match child.reap(DISCARD_REAP_TIMEOUT) {
            Some(exit) => debug!("pid {} {exit}", child.pid()),
            None => warn!("pid {} still running after SIGKILL", child.pid()),
        }
        self.reclaim_terminal(child);
    }

    /// Returns the terminal to the supervisor if `child` had taken it.
    pub fn reclaim_terminal(&self, child: &ChildProcess) {
        if let Some(terminal) = &self.terminal
            && child.holds_terminal()
            && let Err(err) = terminal.reclaim()
        {
            warn!("failed to reclaim terminal from pid {}: {err}", child.pid());
        }
    }

    /// Blocks until `child` exits or a shutdown is requested.
    pub fn await_exit(
        &self,
        child: &mut ChildProcess,
        signals: &SignalBridge,
    ) -> Result<WaitOutcome, SupervisorError> {
        let pid = child.pid();
        let outcome = child
            .wait(signals)
            .map_err(|source| SupervisorError::Wait { pid, source })?;
        if let WaitOutcome::Exited(_) = outcome {
            self.reclaim_terminal(child);
        }
        Ok(outcome)
    }
}
