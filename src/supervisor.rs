//! The supervise loop.
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tracing::{debug, error, info, warn};

use crate::{
    config::SupervisorConfig,
    daemon, duration,
    error::SupervisorError,
    hooks::{self, HookKind},
    logs,
    pidfile::PidFile,
    restart::{Decision, RestartPolicy, RestartWindow},
    runner::{ChildProcess, ExitClassification, ProcessRunner, WaitOutcome},
    signals::SignalBridge,
    terminal::ForegroundTerminal,
};

/// How long a signalled child is given to exit before the supervisor leaves anyway.
const SHUTDOWN_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Keeps one command running, restarting it until the restart budget runs out
/// or a termination signal arrives.
pub struct Supervisor {
    config: SupervisorConfig,
    runner: ProcessRunner,
    policy: RestartPolicy,
    window: RestartWindow,
    signals: SignalBridge,
}

impl Supervisor {
    /// Creates a supervisor for `config`.
    pub fn new(config: SupervisorConfig) -> Self {
        Self::with_signals(config, SignalBridge::new())
    }

    /// Creates a supervisor that observes shutdown requests through `signals`.
    pub fn with_signals(config: SupervisorConfig, signals: SignalBridge) -> Self {
        Self {
            runner: ProcessRunner::new(config.pidfile.as_deref()),
            policy: RestartPolicy::new(config.max_attempts),
            window: RestartWindow::default(),
            config,
            signals,
        }
    }

    /// Daemonizes if configured, installs signal handlers and supervises until
    /// shutdown. Returns the signal that ended supervision.
    pub fn launch(mut self) -> Result<Signal, SupervisorError> {
        let span = logs::supervisor_span(self.config.prefix.as_deref());
        let _entered = span.enter();

        self.start()?;
        self.run()
    }

    fn start(&mut self) -> Result<(), SupervisorError> {
        if self.config.daemonize {
            daemon::daemonize(&self.config.logfile)?;
            info!("daemonized, logging to {}", self.config.logfile.display());
        }

        if let Some(terminal) = ForegroundTerminal::detect() {
            terminal.prepare()?;
            debug!("children run as the terminal's foreground job");
            self.runner.share_terminal(terminal);
        }

        self.signals.install()?;

        if let Some(path) = &self.config.supervisor_pidfile {
            info!("write supervisor pid to {}", path.display());
            PidFile::new(path).write(std::process::id())?;
        }

        Ok(())
    }

    /// Runs the supervise loop without touching process-wide state.
    ///
    /// Returns `Ok` with the signal that requested shutdown, or
    /// [`SupervisorError::RestartBudgetExhausted`] once the child restarts too often.
    pub fn run(&mut self) -> Result<Signal, SupervisorError> {
        loop {
            let mut child = self.runner.spawn(&self.config.command)?;

            let exit = match self.runner.await_exit(&mut child, &self.signals)? {
                WaitOutcome::Exited(exit) => exit,
                WaitOutcome::Interrupted(signal) => {
                    return Ok(self.shut_down(signal, Some(&mut child)));
                }
            };
            self.log_exit(&child, exit);

            if let Some(signal) = terminal_interrupt(&child, exit) {
                info!("{signal} from terminal");
                self.signals.request(signal);
            }

            if exit.is_failure() {
                info!("sleep({})", duration::format_short(self.config.backoff));
                if let Some(signal) = self.signals.sleep(self.config.backoff) {
                    return Ok(self.shut_down(signal, None));
                }
            }

            if let Some(signal) = self.signals.requested() {
                return Ok(self.shut_down(signal, None));
            }

            if let Some(command) = &self.config.on_restart {
                hooks::run_hook(HookKind::OnRestart, command, &self.signals);
                if let Some(signal) = self.signals.requested() {
                    return Ok(self.shut_down(signal, None));
                }
            }

            if self.evaluate_restart(Instant::now()) == Decision::BailOut {
                return self.bail_out();
            }
        }
    }

    fn log_exit(&self, child: &ChildProcess, exit: ExitClassification) {
        let uptime = duration::format_long(child.uptime());
        match exit {
            ExitClassification::ExitedCleanly => {
                info!("pid {} {exit} after {uptime}", child.pid())
            }
            _ => warn!("pid {} {exit} after {uptime}", child.pid()),
        }
    }

    fn evaluate_restart(&mut self, now: Instant) -> Decision {
        if self.window.last_restart_at.is_some() {
            info!(
                "last restart {} ago",
                duration::format_long(self.window.since_last_restart(now))
            );
        }
        info!(
            "{} attempts remaining",
            self.policy.remaining(&self.window)
        );

        let (next, decision) = self.policy.decide(self.window, now);
        self.window = next;
        self.window.record_restart(now);
        debug!(
            attempts = self.window.attempts,
            clock_ms = self.window.clock_ms,
            "restart evaluated: {decision:?}"
        );
        decision
    }

    fn bail_out(&self) -> Result<Signal, SupervisorError> {
        if let Some(signal) = self.signals.requested() {
            return Ok(self.shut_down(signal, None));
        }

        let err = SupervisorError::RestartBudgetExhausted {
            attempts: self.policy.max_attempts(),
            window: self.window.consumed(),
        };
        error!("{err}");

        if let Some(command) = &self.config.on_error {
            hooks::run_hook(HookKind::OnError, command, &self.signals);
        }

        Err(err)
    }

    fn shut_down(&self, signal: Signal, child: Option<&mut ChildProcess>) -> Signal {
        info!("shutting down");

        let Some(child) = child else {
            return signal;
        };

        info!("kill({}, {signal})", child.pid());
        match child.signal_group(signal) {
            Ok(()) => match child.reap(SHUTDOWN_REAP_TIMEOUT) {
                Some(exit) => debug!("pid {} {exit}", child.pid()),
                None => warn!("pid {} still running, leaving it behind", child.pid()),
            },
            Err(err) => error!("failed to signal pid {}: {err}", child.pid()),
        }
        self.runner.reclaim_terminal(child);

        signal
    }
}

/// The interrupt or quit key typed at a terminal the child was holding.
///
/// Such keystrokes only reach the child's group, so they stand in for a
/// shutdown request addressed to the supervisor.
fn terminal_interrupt(child: &ChildProcess, exit: ExitClassification) -> Option<Signal> {
    if !child.holds_terminal() {
        return None;
    }

    match exit {
        ExitClassification::Signaled(raw) if raw == libc::SIGINT => Some(Signal::SIGINT),
        ExitClassification::Signaled(raw) if raw == libc::SIGQUIT => Some(Signal::SIGQUIT),
        _ => None,
    }
}
